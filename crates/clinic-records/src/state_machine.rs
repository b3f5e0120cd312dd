//! 预约状态机
//!
//! 管理预约的完整生命周期状态转换

use clinic_core::{AppointmentStatus, ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 预约状态转换事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEvent {
    Confirm,
    Start,
    Complete,
    Cancel,
    MarkNoShow,
    Reschedule,
}

/// 预约状态机
#[derive(Debug)]
pub struct AppointmentStateMachine {
    transitions: HashMap<(AppointmentStatus, AppointmentEvent), AppointmentStatus>,
}

impl AppointmentStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则：除显式改期外全部单向前进
        transitions.insert(
            (AppointmentStatus::Scheduled, AppointmentEvent::Confirm),
            AppointmentStatus::Confirmed,
        );
        transitions.insert(
            (AppointmentStatus::Confirmed, AppointmentEvent::Start),
            AppointmentStatus::InProgress,
        );
        transitions.insert(
            (AppointmentStatus::InProgress, AppointmentEvent::Complete),
            AppointmentStatus::Completed,
        );
        transitions.insert(
            (AppointmentStatus::Scheduled, AppointmentEvent::Cancel),
            AppointmentStatus::Cancelled,
        );
        transitions.insert(
            (AppointmentStatus::Confirmed, AppointmentEvent::Cancel),
            AppointmentStatus::Cancelled,
        );
        transitions.insert(
            (AppointmentStatus::Scheduled, AppointmentEvent::MarkNoShow),
            AppointmentStatus::NoShow,
        );
        transitions.insert(
            (AppointmentStatus::Confirmed, AppointmentEvent::MarkNoShow),
            AppointmentStatus::NoShow,
        );
        // 改期：移动日期/时间后回到已预约状态
        transitions.insert(
            (AppointmentStatus::Scheduled, AppointmentEvent::Reschedule),
            AppointmentStatus::Scheduled,
        );
        transitions.insert(
            (AppointmentStatus::Confirmed, AppointmentEvent::Reschedule),
            AppointmentStatus::Scheduled,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: AppointmentStatus, event: &AppointmentEvent) -> bool {
        self.transitions.contains_key(&(from, event.clone()))
    }

    /// 执行状态转换
    pub fn transition(
        &self,
        from: AppointmentStatus,
        event: &AppointmentEvent,
    ) -> Result<AppointmentStatus> {
        match self.transitions.get(&(from, event.clone())) {
            Some(to) => Ok(*to),
            None => Err(ClinicError::InvalidStateTransition {
                from: from.as_str().to_string(),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 请求的目标状态对应的事件
    pub fn event_for_target(target: AppointmentStatus) -> Option<AppointmentEvent> {
        match target {
            AppointmentStatus::Confirmed => Some(AppointmentEvent::Confirm),
            AppointmentStatus::InProgress => Some(AppointmentEvent::Start),
            AppointmentStatus::Completed => Some(AppointmentEvent::Complete),
            AppointmentStatus::Cancelled => Some(AppointmentEvent::Cancel),
            AppointmentStatus::NoShow => Some(AppointmentEvent::MarkNoShow),
            AppointmentStatus::Rescheduled | AppointmentStatus::Scheduled => {
                Some(AppointmentEvent::Reschedule)
            }
        }
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: AppointmentStatus) -> Vec<AppointmentEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Default for AppointmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = AppointmentStateMachine::new();

        assert!(sm.can_transition(AppointmentStatus::Scheduled, &AppointmentEvent::Confirm));
        assert!(sm.can_transition(AppointmentStatus::Confirmed, &AppointmentEvent::Start));
        assert!(sm.can_transition(AppointmentStatus::InProgress, &AppointmentEvent::Complete));
        assert!(sm.can_transition(AppointmentStatus::Confirmed, &AppointmentEvent::Cancel));
        assert!(sm.can_transition(AppointmentStatus::Scheduled, &AppointmentEvent::MarkNoShow));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = AppointmentStateMachine::new();

        assert!(!sm.can_transition(AppointmentStatus::Completed, &AppointmentEvent::Start));
        assert!(!sm.can_transition(AppointmentStatus::Cancelled, &AppointmentEvent::Confirm));
        assert!(!sm.can_transition(AppointmentStatus::InProgress, &AppointmentEvent::Cancel));
        assert!(!sm.can_transition(AppointmentStatus::InProgress, &AppointmentEvent::Reschedule));
    }

    #[test]
    fn test_reschedule_returns_to_scheduled() {
        let sm = AppointmentStateMachine::new();

        let next = sm
            .transition(AppointmentStatus::Confirmed, &AppointmentEvent::Reschedule)
            .unwrap();
        assert_eq!(next, AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_transition_execution() {
        let sm = AppointmentStateMachine::new();

        let next = sm
            .transition(AppointmentStatus::Scheduled, &AppointmentEvent::Confirm)
            .unwrap();
        assert_eq!(next, AppointmentStatus::Confirmed);

        let result = sm.transition(AppointmentStatus::Scheduled, &AppointmentEvent::Complete);
        assert!(result.is_err());
    }
}
