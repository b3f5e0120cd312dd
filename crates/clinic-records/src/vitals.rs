//! 生命体征告警规则引擎
//!
//! 纯函数规则评估：同一读数总是产生相同顺序的告警列表。
//! 评估顺序固定为 血压 → 心率 → 体温 → 呼吸频率 → 血氧饱和度。

use clinic_core::VitalSignsContent;
use serde::{Deserialize, Serialize};

/// 告警严重程度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Medium,
    High,
    Critical,
}

/// 告警类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighBloodPressure,
    LowBloodPressure,
    Tachycardia,
    Bradycardia,
    Fever,
    Hypothermia,
    Tachypnea,
    Bradypnea,
    CriticalLowOxygen,
    LowOxygen,
}

/// 单条生命体征告警
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalAlert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub severity: AlertSeverity,
}

impl VitalAlert {
    fn new(alert_type: AlertType, message: String, severity: AlertSeverity) -> Self {
        Self {
            alert_type,
            message,
            severity,
        }
    }
}

/// 评估一次生命体征读数
///
/// 缺失的字段静默跳过对应规则；血压规则要求收缩压与舒张压同时存在。
/// 多条规则可以同时命中，返回顺序与类别评估顺序一致。
pub fn evaluate(reading: &VitalSignsContent) -> Vec<VitalAlert> {
    let mut alerts = Vec::new();

    // 血压
    if let (Some(systolic), Some(diastolic)) = (
        reading.blood_pressure_systolic,
        reading.blood_pressure_diastolic,
    ) {
        if systolic > 140 || diastolic > 90 {
            alerts.push(VitalAlert::new(
                AlertType::HighBloodPressure,
                format!("Blood pressure {}/{} mmHg is elevated", systolic, diastolic),
                AlertSeverity::High,
            ));
        }
        if systolic < 90 || diastolic < 60 {
            alerts.push(VitalAlert::new(
                AlertType::LowBloodPressure,
                format!("Blood pressure {}/{} mmHg is low", systolic, diastolic),
                AlertSeverity::Medium,
            ));
        }
    }

    // 心率
    if let Some(heart_rate) = reading.heart_rate {
        if heart_rate > 100 {
            alerts.push(VitalAlert::new(
                AlertType::Tachycardia,
                format!("Heart rate {} bpm is above normal range", heart_rate),
                AlertSeverity::Medium,
            ));
        }
        if heart_rate < 60 {
            alerts.push(VitalAlert::new(
                AlertType::Bradycardia,
                format!("Heart rate {} bpm is below normal range", heart_rate),
                AlertSeverity::Medium,
            ));
        }
    }

    // 体温（统一换算为华氏度后评估）
    if let Some(fahrenheit) = reading.temperature_fahrenheit() {
        if fahrenheit > 100.4 {
            alerts.push(VitalAlert::new(
                AlertType::Fever,
                format!("Temperature {:.1}F indicates fever", fahrenheit),
                AlertSeverity::High,
            ));
        }
        if fahrenheit < 96.0 {
            alerts.push(VitalAlert::new(
                AlertType::Hypothermia,
                format!("Temperature {:.1}F indicates hypothermia", fahrenheit),
                AlertSeverity::Medium,
            ));
        }
    }

    // 呼吸频率
    if let Some(respiratory_rate) = reading.respiratory_rate {
        if respiratory_rate > 24 {
            alerts.push(VitalAlert::new(
                AlertType::Tachypnea,
                format!("Respiratory rate {} /min is elevated", respiratory_rate),
                AlertSeverity::Medium,
            ));
        }
        if respiratory_rate < 12 {
            alerts.push(VitalAlert::new(
                AlertType::Bradypnea,
                format!("Respiratory rate {} /min is low", respiratory_rate),
                AlertSeverity::Medium,
            ));
        }
    }

    // 血氧饱和度
    if let Some(oxygen_saturation) = reading.oxygen_saturation {
        if oxygen_saturation < 90 {
            alerts.push(VitalAlert::new(
                AlertType::CriticalLowOxygen,
                format!(
                    "Oxygen saturation {}% is critically low",
                    oxygen_saturation
                ),
                AlertSeverity::Critical,
            ));
        } else if oxygen_saturation <= 94 {
            alerts.push(VitalAlert::new(
                AlertType::LowOxygen,
                format!("Oxygen saturation {}% is low", oxygen_saturation),
                AlertSeverity::High,
            ));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::TemperatureUnit;

    fn reading() -> VitalSignsContent {
        VitalSignsContent::default()
    }

    #[test]
    fn test_bp_thresholds_are_exclusive() {
        // 正好 140/90 不触发告警
        let mut r = reading();
        r.blood_pressure_systolic = Some(140);
        r.blood_pressure_diastolic = Some(90);
        assert!(evaluate(&r).is_empty());

        // 141/80 触发高血压告警
        r.blood_pressure_systolic = Some(141);
        r.blood_pressure_diastolic = Some(80);
        let alerts = evaluate(&r);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::HighBloodPressure);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_partial_bp_data_produces_no_alert() {
        let mut r = reading();
        r.blood_pressure_systolic = Some(200);
        assert!(evaluate(&r).is_empty());
    }

    #[test]
    fn test_low_bp() {
        let mut r = reading();
        r.blood_pressure_systolic = Some(85);
        r.blood_pressure_diastolic = Some(70);
        let alerts = evaluate(&r);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::LowBloodPressure);
        assert_eq!(alerts[0].severity, AlertSeverity::Medium);
    }

    #[test]
    fn test_heart_rate_rules() {
        let mut r = reading();
        r.heart_rate = Some(101);
        assert_eq!(evaluate(&r)[0].alert_type, AlertType::Tachycardia);

        r.heart_rate = Some(59);
        assert_eq!(evaluate(&r)[0].alert_type, AlertType::Bradycardia);

        // 阈值为闭区间之外
        r.heart_rate = Some(100);
        assert!(evaluate(&r).is_empty());
        r.heart_rate = Some(60);
        assert!(evaluate(&r).is_empty());
    }

    #[test]
    fn test_fever_from_celsius_reading() {
        let mut r = reading();
        r.temperature = Some(38.1);
        r.temperature_unit = TemperatureUnit::C;

        // 38.1C -> 100.58F -> 发热
        let alerts = evaluate(&r);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Fever);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_hypothermia() {
        let mut r = reading();
        r.temperature = Some(95.5);
        r.temperature_unit = TemperatureUnit::F;
        let alerts = evaluate(&r);
        assert_eq!(alerts[0].alert_type, AlertType::Hypothermia);
        assert_eq!(alerts[0].severity, AlertSeverity::Medium);
    }

    #[test]
    fn test_respiratory_rate_rules() {
        let mut r = reading();
        r.respiratory_rate = Some(25);
        assert_eq!(evaluate(&r)[0].alert_type, AlertType::Tachypnea);

        r.respiratory_rate = Some(11);
        assert_eq!(evaluate(&r)[0].alert_type, AlertType::Bradypnea);

        r.respiratory_rate = Some(24);
        assert!(evaluate(&r).is_empty());
        r.respiratory_rate = Some(12);
        assert!(evaluate(&r).is_empty());
    }

    #[test]
    fn test_oxygen_saturation_bands() {
        let mut r = reading();
        r.oxygen_saturation = Some(89);
        let alerts = evaluate(&r);
        assert_eq!(alerts[0].alert_type, AlertType::CriticalLowOxygen);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);

        r.oxygen_saturation = Some(92);
        let alerts = evaluate(&r);
        assert_eq!(alerts[0].alert_type, AlertType::LowOxygen);
        assert_eq!(alerts[0].severity, AlertSeverity::High);

        // 94 含在低氧区间内，95 以上正常
        r.oxygen_saturation = Some(94);
        assert_eq!(evaluate(&r)[0].alert_type, AlertType::LowOxygen);
        r.oxygen_saturation = Some(96);
        assert!(evaluate(&r).is_empty());
    }

    #[test]
    fn test_empty_reading_yields_no_alerts() {
        assert!(evaluate(&reading()).is_empty());
    }

    #[test]
    fn test_multiple_alerts_in_fixed_category_order() {
        let r = VitalSignsContent {
            blood_pressure_systolic: Some(150),
            blood_pressure_diastolic: Some(95),
            heart_rate: Some(110),
            temperature: Some(101.2),
            temperature_unit: TemperatureUnit::F,
            respiratory_rate: Some(26),
            oxygen_saturation: Some(88),
            notes: None,
        };

        let alerts = evaluate(&r);
        let types: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(
            types,
            vec![
                AlertType::HighBloodPressure,
                AlertType::Tachycardia,
                AlertType::Fever,
                AlertType::Tachypnea,
                AlertType::CriticalLowOxygen,
            ]
        );

        // 相同输入得到相同结果
        assert_eq!(evaluate(&r), alerts);
    }

    #[test]
    fn test_alert_serialization_uses_snake_case() {
        let alert = VitalAlert::new(
            AlertType::CriticalLowOxygen,
            "Oxygen saturation 89% is critically low".to_string(),
            AlertSeverity::Critical,
        );
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "critical_low_oxygen");
        assert_eq!(value["severity"], "critical");
    }
}
