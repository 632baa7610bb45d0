use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Account role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Admin => "ADMIN",
        }
    }

    /// Parse a role name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Some(Role::Student),
            "TEACHER" => Some(Role::Teacher),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile snapshot of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub full_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_profile: Option<StudentProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_profile: Option<TeacherProfile>,
}

impl User {
    /// Name for display, falling back to first/last name and then the email.
    pub fn display_name(&self) -> String {
        if !self.full_name.trim().is_empty() {
            return self.full_name.trim().to_string();
        }
        let joined = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let joined = joined.trim();
        if joined.is_empty() {
            self.email.clone()
        } else {
            joined.to_string()
        }
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StudentProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub subjects_interested: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_learning_style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TeacherProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default)]
    pub years_of_experience: u32,
    #[serde(default)]
    pub subjects_taught: Vec<String>,
    #[serde(default)]
    pub teaching_languages: Vec<String>,
    /// Decimal fields arrive as strings from the backend serializer.
    #[serde(default, deserialize_with = "de_number_or_string")]
    pub hourly_rate: f64,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub available_for_offline: bool,
    #[serde(default)]
    pub available_for_online: bool,
    #[serde(default, deserialize_with = "de_number_or_string")]
    pub average_rating: f64,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub total_sessions: u32,
}

fn de_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
        Null(()),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) if s.trim().is_empty() => Ok(0.0),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        NumberOrString::Null(()) => Ok(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_json() -> &'static str {
        r#"{
            "id": 1,
            "email": "a@b.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "full_name": "Ada Lovelace",
            "role": "STUDENT",
            "is_email_verified": true,
            "created_at": "2024-03-01T10:00:00Z",
            "student_profile": {"grade_level": "10", "subjects_interested": ["math"]},
            "some_new_field": 42
        }"#
    }

    #[test]
    fn test_parse_student_user() {
        let user: User = serde_json::from_str(student_json()).expect("parse user");
        assert_eq!(user.id, 1);
        assert_eq!(user.role, Role::Student);
        assert!(user.is_student());
        assert!(user.teacher_profile.is_none());
        let profile = user.student_profile.expect("student profile");
        assert_eq!(profile.grade_level.as_deref(), Some("10"));
        assert_eq!(profile.subjects_interested, vec!["math".to_string()]);
    }

    #[test]
    fn test_parse_teacher_profile_decimal_strings() {
        let json = r#"{"years_of_experience": 5, "hourly_rate": "25.50", "average_rating": null,
                       "subjects_taught": ["physics"], "teaching_languages": ["en"]}"#;
        let profile: TeacherProfile = serde_json::from_str(json).expect("parse teacher profile");
        assert_eq!(profile.hourly_rate, 25.5);
        assert_eq!(profile.average_rating, 0.0);
        assert_eq!(profile.years_of_experience, 5);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user: User = serde_json::from_str(student_json()).expect("parse user");
        assert_eq!(user.display_name(), "Ada Lovelace");

        user.full_name = String::new();
        user.first_name = "Ada".to_string();
        user.last_name = String::new();
        assert_eq!(user.display_name(), "Ada");

        user.first_name = String::new();
        assert_eq!(user.display_name(), "a@b.com");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("teacher"), Some(Role::Teacher));
        assert_eq!(Role::parse(" ADMIN "), Some(Role::Admin));
        assert_eq!(Role::parse("parent"), None);
        assert_eq!(Role::Student.to_string(), "STUDENT");
    }
}
