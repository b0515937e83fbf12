//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{DonationKind, NewDonationRequest, NewProject};

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();

    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.chars().count() > 255 {
        return Err("Name must be at most 255 characters long".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Trim `value` and fail when nothing is left
pub fn required_text(field: &str, value: &str) -> WorkflowResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Normalize and validate a new project
pub fn validate_project(project: NewProject) -> WorkflowResult<NewProject> {
    let name = required_text("Project name", &project.name)?;
    let description = required_text("Project description", &project.description)?;

    if project.required_participants < 1 {
        return Err(WorkflowError::Validation(
            "Required participants must be at least 1".to_string(),
        ));
    }

    Ok(NewProject {
        name,
        description,
        image_url: project
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
        ..project
    })
}

/// Normalize and validate a donation request.
///
/// The target matching `kind` must be positive; the other one is dropped.
pub fn validate_donation_request(
    request: NewDonationRequest,
) -> WorkflowResult<NewDonationRequest> {
    let title = required_text("Title", &request.title)?;
    let description = required_text("Description", &request.description)?;
    let category = required_text("Category", &request.category)?;

    let (target_amount, target_items) = match request.kind {
        DonationKind::Money => match request.target_amount {
            Some(amount) if amount > 0 => (Some(amount), None),
            _ => {
                return Err(WorkflowError::Validation(
                    "Target amount must be greater than zero for money donations".to_string(),
                ));
            }
        },
        DonationKind::Goods => match request.target_items {
            Some(items) if items > 0 => (None, Some(items)),
            _ => {
                return Err(WorkflowError::Validation(
                    "Target items must be greater than zero for goods donations".to_string(),
                ));
            }
        },
    };

    Ok(NewDonationRequest {
        title,
        description,
        category,
        kind: request.kind,
        target_amount,
        target_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("relawan@donasi.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email(&format!("{}@x.com", "a".repeat(260))).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("rahasia123").is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Siti").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(256)).is_err());
    }

    #[test]
    fn test_validate_project() {
        let project = NewProject {
            name: "  Bersih Pantai ".to_string(),
            description: "Membersihkan pantai".to_string(),
            is_active: true,
            start_date: NaiveDate::from_ymd_opt(2024, 8, 17).unwrap(),
            required_participants: 10,
            image_url: Some(" ".to_string()),
        };
        let normalized = validate_project(project.clone()).unwrap();
        assert_eq!(normalized.name, "Bersih Pantai");
        assert_eq!(normalized.image_url, None);

        let no_slots = NewProject {
            required_participants: 0,
            ..project
        };
        assert_eq!(validate_project(no_slots).unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_donation_request_keeps_only_matching_target() {
        let request = NewDonationRequest {
            title: "Sembako".to_string(),
            description: "Paket sembako untuk warga".to_string(),
            category: "pangan".to_string(),
            kind: DonationKind::Goods,
            target_amount: Some(500_000),
            target_items: Some(50),
        };

        let normalized = validate_donation_request(request).unwrap();
        assert_eq!(normalized.target_amount, None);
        assert_eq!(normalized.target_items, Some(50));
    }

    #[test]
    fn test_donation_request_requires_positive_target() {
        let request = NewDonationRequest {
            title: "Renovasi".to_string(),
            description: "Renovasi sekolah".to_string(),
            category: "uang".to_string(),
            kind: DonationKind::Money,
            target_amount: None,
            target_items: Some(10),
        };
        assert_eq!(
            validate_donation_request(request).unwrap_err().kind(),
            "validation"
        );
    }
}
