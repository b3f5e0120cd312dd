//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use chrono::{NaiveDate, NaiveTime};
use clinic_core::{
    Appointment, AppointmentStatus, ClinicError, MedicalCard, MedicalRecord, Prescription,
    PrescriptionStatus, Result, User,
};
use sqlx::Row;
use uuid::Uuid;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建用户表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                email VARCHAR(255) UNIQUE NOT NULL,
                password_hash VARCHAR(128) NOT NULL,
                role VARCHAR(20) NOT NULL,
                status VARCHAR(24) NOT NULL DEFAULT 'active',
                phone VARCHAR(32),
                email_verified_at TIMESTAMP WITH TIME ZONE,
                student_id VARCHAR(64) UNIQUE,
                department VARCHAR(128),
                staff_no VARCHAR(64) UNIQUE,
                faculty VARCHAR(128),
                medical_license_number VARCHAR(64) UNIQUE,
                specialization VARCHAR(128),
                custom_permissions JSONB NOT NULL DEFAULT '[]',
                doctor_id UUID REFERENCES users(id),
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建预约表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES users(id),
                doctor_id UUID NOT NULL REFERENCES users(id),
                date DATE NOT NULL,
                time TIME NOT NULL,
                appointment_type VARCHAR(64) NOT NULL,
                duration_minutes INTEGER NOT NULL,
                reason TEXT,
                priority VARCHAR(16) NOT NULL DEFAULT 'normal',
                status VARCHAR(20) NOT NULL DEFAULT 'scheduled',
                room VARCHAR(32),
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建病历记录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS medical_records (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES users(id),
                doctor_id UUID NOT NULL,
                record_type VARCHAR(20) NOT NULL,
                content JSONB NOT NULL,
                diagnosis TEXT,
                treatment TEXT,
                visit_date DATE NOT NULL,
                created_by UUID NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建处方表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS prescriptions (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES users(id),
                doctor_id UUID NOT NULL,
                medications JSONB NOT NULL,
                diagnosis TEXT,
                status VARCHAR(16) NOT NULL DEFAULT 'active',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建就诊卡表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS medical_cards (
                id UUID PRIMARY KEY,
                patient_id UUID UNIQUE NOT NULL REFERENCES users(id),
                emergency_contact VARCHAR(255) NOT NULL,
                medical_history TEXT,
                current_medications TEXT,
                allergies TEXT,
                previous_conditions TEXT,
                family_history TEXT,
                insurance_info TEXT,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| ClinicError::Database(e.to_string()))?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
            "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
            "CREATE INDEX IF NOT EXISTS idx_users_doctor_id ON users(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_doctor_id ON appointments(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status)",
            "CREATE INDEX IF NOT EXISTS idx_medical_records_patient_id ON medical_records(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_medical_records_record_type ON medical_records(record_type)",
            "CREATE INDEX IF NOT EXISTS idx_medical_records_visit_date ON medical_records(visit_date)",
            "CREATE INDEX IF NOT EXISTS idx_prescriptions_patient_id ON prescriptions(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_medical_cards_patient_id ON medical_cards(patient_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| ClinicError::Database(e.to_string()))?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    // ========== 用户相关操作 ==========

    /// 创建新用户
    pub async fn create_user(&self, user: &User) -> Result<Uuid> {
        let pool = self.pool.pool();
        let permissions = serde_json::to_value(&user.custom_permissions)?;

        sqlx::query(r#"
            INSERT INTO users (
                id, name, email, password_hash, role, status, phone, email_verified_at,
                student_id, department, staff_no, faculty, medical_license_number,
                specialization, custom_permissions, doctor_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
        "#)
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role().as_str())
        .bind(user.status.as_str())
        .bind(&user.phone)
        .bind(user.email_verified_at)
        .bind(user.attributes.student_id())
        .bind(department_of(user))
        .bind(user.attributes.staff_no())
        .bind(faculty_of(user))
        .bind(user.attributes.medical_license_number())
        .bind(specialization_of(user))
        .bind(permissions)
        .bind(user.doctor_id)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 根据ID查找用户
    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        result.map(User::try_from).transpose()
    }

    /// 根据邮箱查找用户
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        result.map(User::try_from).transpose()
    }

    /// 更新用户状态
    pub async fn set_user_status(&self, id: &Uuid, status: &str) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("UPDATE users SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    /// 更新医患指派
    pub async fn set_doctor_assignment(
        &self,
        patient_id: &Uuid,
        doctor_id: Option<Uuid>,
    ) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("UPDATE users SET doctor_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(doctor_id)
            .bind(patient_id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    /// 医生指派的所有患者
    pub async fn get_patients_by_doctor_id(&self, doctor_id: &Uuid) -> Result<Vec<User>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbUser>(
            "SELECT * FROM users WHERE doctor_id = $1 ORDER BY name",
        )
        .bind(doctor_id)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        results.into_iter().map(User::try_from).collect()
    }

    /// 删除医生
    ///
    /// 在同一个事务内先清空所有患者的 doctor_id 再删除医生记录，
    /// 解除指派无法完成时整体回滚。
    pub async fn delete_doctor(&self, doctor_id: &Uuid) -> Result<u64> {
        let pool = self.pool.pool();

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        let unassigned = sqlx::query(
            "UPDATE users SET doctor_id = NULL, updated_at = NOW() WHERE doctor_id = $1",
        )
        .bind(doctor_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ClinicError::PrecedingReassignmentRequired(e.to_string()))?
        .rows_affected();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(doctor_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        tracing::info!(
            "Deleted doctor {} and unassigned {} patients",
            doctor_id,
            unassigned
        );
        Ok(unassigned)
    }

    /// 删除非医生用户
    pub async fn delete_user(&self, id: &Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 预约相关操作 ==========

    /// 创建新预约
    pub async fn create_appointment(&self, appointment: &Appointment) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO appointments (
                id, patient_id, doctor_id, date, time, appointment_type,
                duration_minutes, reason, priority, status, room
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
        "#)
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.date)
        .bind(appointment.time)
        .bind(&appointment.appointment_type)
        .bind(appointment.duration_minutes)
        .bind(&appointment.reason)
        .bind(priority_str(appointment))
        .bind(appointment.status.as_str())
        .bind(&appointment.room)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 根据ID查找预约
    pub async fn get_appointment_by_id(&self, id: &Uuid) -> Result<Option<Appointment>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbAppointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(result.map(Appointment::from))
    }

    /// 患者在某日期的全部预约
    pub async fn get_appointments_by_patient_and_date(
        &self,
        patient_id: &Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbAppointment>(
            "SELECT * FROM appointments WHERE patient_id = $1 AND date = $2 ORDER BY time",
        )
        .bind(patient_id)
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(results.into_iter().map(Appointment::from).collect())
    }

    /// 更新预约状态
    pub async fn update_appointment_status(
        &self,
        id: &Uuid,
        status: AppointmentStatus,
    ) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("UPDATE appointments SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    /// 更新预约日期/时间（改期）
    pub async fn update_appointment_schedule(
        &self,
        id: &Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            UPDATE appointments
            SET date = $1, time = $2, status = 'scheduled', updated_at = NOW()
            WHERE id = $3
        "#)
        .bind(date)
        .bind(time)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 病历记录相关操作 ==========

    /// 创建新病历记录
    pub async fn create_medical_record(&self, record: &MedicalRecord) -> Result<Uuid> {
        let pool = self.pool.pool();
        let content = serde_json::to_value(&record.content)?;

        sqlx::query(r#"
            INSERT INTO medical_records (
                id, patient_id, doctor_id, record_type, content,
                diagnosis, treatment, visit_date, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
        "#)
        .bind(record.id)
        .bind(record.patient_id)
        .bind(record.doctor_id)
        .bind(record.content.type_str())
        .bind(content)
        .bind(&record.diagnosis)
        .bind(&record.treatment)
        .bind(record.visit_date)
        .bind(record.created_by)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 患者的全部病历记录
    pub async fn get_records_by_patient_id(&self, patient_id: &Uuid) -> Result<Vec<MedicalRecord>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbMedicalRecord>(
            "SELECT * FROM medical_records WHERE patient_id = $1 ORDER BY visit_date DESC, created_at DESC",
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        results.into_iter().map(MedicalRecord::try_from).collect()
    }

    /// 更新记录内容（仅用于任务完成这一种允许的变更）
    pub async fn update_record_content(&self, record: &MedicalRecord) -> Result<()> {
        let pool = self.pool.pool();
        let content = serde_json::to_value(&record.content)?;

        sqlx::query("UPDATE medical_records SET content = $1 WHERE id = $2")
            .bind(content)
            .bind(record.id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 处方相关操作 ==========

    /// 创建新处方
    pub async fn create_prescription(&self, prescription: &Prescription) -> Result<Uuid> {
        let pool = self.pool.pool();
        let medications = serde_json::to_value(&prescription.medications)?;

        sqlx::query(r#"
            INSERT INTO prescriptions (id, patient_id, doctor_id, medications, diagnosis, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        "#)
        .bind(prescription.id)
        .bind(prescription.patient_id)
        .bind(prescription.doctor_id)
        .bind(medications)
        .bind(&prescription.diagnosis)
        .bind(prescription.status.as_str())
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 患者的全部处方
    pub async fn get_prescriptions_by_patient_id(
        &self,
        patient_id: &Uuid,
    ) -> Result<Vec<Prescription>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbPrescription>(
            "SELECT * FROM prescriptions WHERE patient_id = $1 ORDER BY created_at DESC",
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        results.into_iter().map(Prescription::try_from).collect()
    }

    /// 更新处方状态
    pub async fn update_prescription_status(
        &self,
        id: &Uuid,
        status: PrescriptionStatus,
    ) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("UPDATE prescriptions SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 就诊卡相关操作 ==========

    /// 创建或更新患者的就诊卡
    pub async fn upsert_medical_card(&self, card: &MedicalCard) -> Result<Uuid> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO medical_cards (
                id, patient_id, emergency_contact, medical_history, current_medications,
                allergies, previous_conditions, family_history, insurance_info
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (patient_id) DO UPDATE SET
                emergency_contact = EXCLUDED.emergency_contact,
                medical_history = EXCLUDED.medical_history,
                current_medications = EXCLUDED.current_medications,
                allergies = EXCLUDED.allergies,
                previous_conditions = EXCLUDED.previous_conditions,
                family_history = EXCLUDED.family_history,
                insurance_info = EXCLUDED.insurance_info,
                updated_at = NOW()
            RETURNING id
        "#)
        .bind(card.id)
        .bind(card.patient_id)
        .bind(&card.emergency_contact)
        .bind(&card.medical_history)
        .bind(&card.current_medications)
        .bind(&card.allergies)
        .bind(&card.previous_conditions)
        .bind(&card.family_history)
        .bind(&card.insurance_info)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| ClinicError::Database(e.to_string()))
    }

    /// 患者的就诊卡
    pub async fn get_medical_card(&self, patient_id: &Uuid) -> Result<Option<MedicalCard>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbMedicalCard>(
            "SELECT * FROM medical_cards WHERE patient_id = $1",
        )
        .bind(patient_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ClinicError::Database(e.to_string()))?;

        Ok(result.map(MedicalCard::from))
    }
}

fn priority_str(appointment: &Appointment) -> &'static str {
    match appointment.priority {
        clinic_core::AppointmentPriority::Normal => "normal",
        clinic_core::AppointmentPriority::High => "high",
        clinic_core::AppointmentPriority::Urgent => "urgent",
    }
}

fn department_of(user: &User) -> Option<&str> {
    match &user.attributes {
        clinic_core::RoleAttributes::Student { department, .. } => Some(department),
        clinic_core::RoleAttributes::ClinicalStaff { department, .. } => Some(department),
        clinic_core::RoleAttributes::AcademicStaff { department, .. } => department.as_deref(),
        _ => None,
    }
}

fn faculty_of(user: &User) -> Option<&str> {
    match &user.attributes {
        clinic_core::RoleAttributes::AcademicStaff { faculty, .. } => Some(faculty),
        _ => None,
    }
}

fn specialization_of(user: &User) -> Option<&str> {
    match &user.attributes {
        clinic_core::RoleAttributes::Doctor { specialization, .. } => Some(specialization),
        _ => None,
    }
}
