//! Field validation for registration input.

use crate::kimlik::TcKimlikNo;
use crate::messages;
use crate::types::{ContactUpdate, NewNeighborhood, NewUserProfile, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Minimum length of given and family names.
pub const MIN_NAME_CHARS: usize = 2;

/// Minimum length of a free-text address.
pub const MIN_ADDRESS_CHARS: usize = 10;

/// Minimum length of a phone number, separators included.
pub const MIN_PHONE_CHARS: usize = 10;

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error for a single field.
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record an error. The first message per field wins.
    pub fn add(&mut self, field: &str, message: &str) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// Error for a reference column whose row the store could not find.
    pub fn unresolved_reference(field: &str) -> Self {
        let message = match field {
            "registered_by" => messages::REGISTRANT_MISSING,
            _ => messages::NEIGHBORHOOD_MISSING,
        };
        Self::single(field, message)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Raw registration input as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub tc_kimlik_no: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Only honored for administrators; everyone else registers into their own neighborhood
    #[serde(default)]
    pub neighborhood_id: Option<String>,
}

/// A registration that passed every field rule and is ready for admission.
///
/// Only obtainable through [`RegistrationForm::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    tc_kimlik_no: TcKimlikNo,
    given_name: String,
    family_name: String,
    address: String,
    phone: Option<String>,
    note: Option<String>,
    neighborhood_id: String,
    registered_by: String,
}

impl NewRegistration {
    pub fn tc_kimlik_no(&self) -> &TcKimlikNo {
        &self.tc_kimlik_no
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn neighborhood_id(&self) -> &str {
        &self.neighborhood_id
    }

    pub fn registered_by(&self) -> &str {
        &self.registered_by
    }
}

impl RegistrationForm {
    /// Check the user-entered fields without building a registration.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.check_into(&mut errors);
        errors.into_result(())
    }

    fn check_into(&self, errors: &mut ValidationErrors) -> Option<TcKimlikNo> {
        let tc = self.tc_kimlik_no.trim();
        let parsed = if tc.is_empty() {
            errors.add("tc_kimlik_no", messages::TC_REQUIRED);
            None
        } else {
            let parsed = TcKimlikNo::parse(tc);
            if parsed.is_none() {
                errors.add("tc_kimlik_no", messages::TC_INVALID);
            }
            parsed
        };

        check_min_chars(
            errors,
            "given_name",
            &self.given_name,
            MIN_NAME_CHARS,
            messages::GIVEN_NAME_REQUIRED,
            messages::GIVEN_NAME_TOO_SHORT,
        );
        check_min_chars(
            errors,
            "family_name",
            &self.family_name,
            MIN_NAME_CHARS,
            messages::FAMILY_NAME_REQUIRED,
            messages::FAMILY_NAME_TOO_SHORT,
        );
        check_min_chars(
            errors,
            "address",
            &self.address,
            MIN_ADDRESS_CHARS,
            messages::ADDRESS_REQUIRED,
            messages::ADDRESS_TOO_SHORT,
        );

        if let Err(message) = normalize_phone(self.phone.as_deref()) {
            errors.add("phone", message);
        }

        parsed
    }

    /// Validate every field and bind the registration to a neighborhood and registrant.
    pub fn validate(
        self,
        neighborhood_id: &str,
        registered_by: &str,
    ) -> Result<NewRegistration, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let tc = self.check_into(&mut errors);

        if neighborhood_id.trim().is_empty() {
            errors.add("neighborhood_id", messages::NEIGHBORHOOD_MISSING);
        }
        if registered_by.trim().is_empty() {
            errors.add("registered_by", messages::REGISTRANT_MISSING);
        }

        let phone = normalize_phone(self.phone.as_deref()).unwrap_or(None);

        match tc {
            Some(tc_kimlik_no) if errors.is_empty() => Ok(NewRegistration {
                tc_kimlik_no,
                given_name: self.given_name.trim().to_string(),
                family_name: self.family_name.trim().to_string(),
                address: self.address.trim().to_string(),
                phone,
                note: normalize_optional(self.note.as_deref()),
                neighborhood_id: neighborhood_id.trim().to_string(),
                registered_by: registered_by.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }
}

/// Raw contact update as submitted by a client.
///
/// An absent field is left unchanged; an empty string clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl ContactForm {
    pub fn validate(self) -> Result<ContactUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let phone = match self.phone.as_deref() {
            None => None,
            Some(raw) => match normalize_phone(Some(raw)) {
                Ok(phone) => Some(phone),
                Err(message) => {
                    errors.add("phone", message);
                    None
                }
            },
        };
        let note = self.note.as_deref().map(|raw| normalize_optional(Some(raw)));

        errors.into_result(ContactUpdate { phone, note })
    }
}

/// Check a neighborhood before creation.
pub fn check_new_neighborhood(neighborhood: &NewNeighborhood) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_min_chars(
        &mut errors,
        "name",
        &neighborhood.name,
        MIN_NAME_CHARS,
        messages::NEIGHBORHOOD_NAME_REQUIRED,
        messages::NEIGHBORHOOD_NAME_REQUIRED,
    );
    check_min_chars(
        &mut errors,
        "representative_name",
        &neighborhood.representative_name,
        MIN_NAME_CHARS,
        messages::REPRESENTATIVE_NAME_REQUIRED,
        messages::REPRESENTATIVE_NAME_REQUIRED,
    );
    errors.into_result(())
}

/// Check a user profile before creation.
///
/// Representatives and ordinary users belong to exactly one neighborhood;
/// administrators to none.
pub fn check_new_user(user: &NewUserProfile) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if user.id.trim().is_empty() {
        errors.add("id", messages::USER_ID_REQUIRED);
    }
    check_min_chars(
        &mut errors,
        "full_name",
        &user.full_name,
        MIN_NAME_CHARS,
        messages::FULL_NAME_REQUIRED,
        messages::FULL_NAME_REQUIRED,
    );

    let email = user.email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed || email.chars().any(char::is_whitespace) {
        errors.add("email", messages::EMAIL_INVALID);
    }

    let neighborhood = user
        .neighborhood_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    match (user.role, neighborhood) {
        (Role::Administrator, Some(_)) => {
            errors.add("neighborhood_id", messages::NEIGHBORHOOD_NOT_ALLOWED_FOR_ADMIN)
        }
        (Role::NeighborhoodRepresentative | Role::RegisteredUser, None) => {
            errors.add("neighborhood_id", messages::NEIGHBORHOOD_REQUIRED_FOR_ROLE)
        }
        _ => {}
    }

    errors.into_result(())
}

fn check_min_chars(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    min: usize,
    required: &str,
    too_short: &str,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, required);
    } else if trimmed.chars().count() < min {
        errors.add(field, too_short);
    }
}

/// Trim an optional phone number; empty means none.
///
/// Accepts digits, spaces, parentheses, `-` and `+`, at least ten characters.
pub fn normalize_phone(raw: Option<&str>) -> Result<Option<String>, &'static str> {
    let Some(trimmed) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '(' | ')' | '-' | '+'));
    if !allowed || trimmed.chars().count() < MIN_PHONE_CHARS {
        return Err(messages::PHONE_INVALID);
    }

    Ok(Some(trimmed.to_string()))
}

fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            tc_kimlik_no: "12345678950".into(),
            given_name: "Ahmet".into(),
            family_name: "Yılmaz".into(),
            address: "Atatürk Cad. No: 12 Daire 3".into(),
            phone: Some("0555 123 4567".into()),
            note: Some("  ".into()),
            neighborhood_id: None,
        }
    }

    #[test]
    fn test_unresolved_reference_messages() {
        let errors = ValidationErrors::unresolved_reference("registered_by");
        assert_eq!(errors.get("registered_by"), Some(messages::REGISTRANT_MISSING));

        let errors = ValidationErrors::unresolved_reference("neighborhood_id");
        assert_eq!(errors.get("neighborhood_id"), Some(messages::NEIGHBORHOOD_MISSING));
    }

    #[test]
    fn test_valid_form_builds_registration() {
        let registration = form().validate("mahalle-1", "user-1").unwrap();
        assert_eq!(registration.tc_kimlik_no().as_str(), "12345678950");
        assert_eq!(registration.given_name(), "Ahmet");
        assert_eq!(registration.phone(), Some("0555 123 4567"));
        assert_eq!(registration.note(), None);
        assert_eq!(registration.neighborhood_id(), "mahalle-1");
        assert_eq!(registration.registered_by(), "user-1");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let mut f = form();
        f.given_name = "  Ayşe ".into();
        f.tc_kimlik_no = " 12345678950 ".into();
        let registration = f.validate("mahalle-1", "user-1").unwrap();
        assert_eq!(registration.given_name(), "Ayşe");
        assert_eq!(registration.tc_kimlik_no().as_str(), "12345678950");
    }

    #[test]
    fn test_invalid_checksum() {
        let mut f = form();
        f.tc_kimlik_no = "12345678901".into();
        let errors = f.validate("mahalle-1", "user-1").unwrap_err();
        assert_eq!(errors.get("tc_kimlik_no"), Some(messages::TC_INVALID));
    }

    #[test]
    fn test_missing_tc() {
        let mut f = form();
        f.tc_kimlik_no = "   ".into();
        let errors = f.check().unwrap_err();
        assert_eq!(errors.get("tc_kimlik_no"), Some(messages::TC_REQUIRED));
    }

    #[test]
    fn test_short_address() {
        let mut f = form();
        f.address = "Main St".into();
        let errors = f.validate("mahalle-1", "user-1").unwrap_err();
        assert_eq!(errors.get("address"), Some(messages::ADDRESS_TOO_SHORT));
        assert!(!errors.contains("tc_kimlik_no"));
    }

    #[test]
    fn test_name_rules() {
        let mut f = form();
        f.given_name = "".into();
        f.family_name = "Y".into();
        let errors = f.check().unwrap_err();
        assert_eq!(errors.get("given_name"), Some(messages::GIVEN_NAME_REQUIRED));
        assert_eq!(errors.get("family_name"), Some(messages::FAMILY_NAME_TOO_SHORT));
    }

    #[test]
    fn test_multibyte_names_count_characters() {
        let mut f = form();
        f.given_name = "Ağ".into();
        assert!(f.check().is_ok());
    }

    #[test]
    fn test_all_errors_reported_together() {
        let f = RegistrationForm::default();
        let errors = f.validate("", "").unwrap_err();
        for field in [
            "tc_kimlik_no",
            "given_name",
            "family_name",
            "address",
            "neighborhood_id",
            "registered_by",
        ] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
    }

    #[test]
    fn test_phone_rules() {
        assert_eq!(normalize_phone(None), Ok(None));
        assert_eq!(normalize_phone(Some("   ")), Ok(None));
        assert_eq!(
            normalize_phone(Some("+90 (555) 123-4567")),
            Ok(Some("+90 (555) 123-4567".into()))
        );
        assert!(normalize_phone(Some("555-1234")).is_err());
        assert!(normalize_phone(Some("0555 123 45ab")).is_err());
    }

    #[test]
    fn test_contact_form() {
        let update = ContactForm {
            phone: Some("".into()),
            note: Some(" Kapı kodu 12 ".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(update.phone, Some(None));
        assert_eq!(update.note, Some(Some("Kapı kodu 12".into())));

        let update = ContactForm::default().validate().unwrap();
        assert!(update.is_empty());

        let errors = ContactForm {
            phone: Some("123".into()),
            note: None,
        }
        .validate()
        .unwrap_err();
        assert!(errors.contains("phone"));
    }

    #[test]
    fn test_new_neighborhood_rules() {
        let ok = NewNeighborhood {
            name: "Merkez".into(),
            representative_name: "Hasan Demir".into(),
        };
        assert!(check_new_neighborhood(&ok).is_ok());

        let errors = check_new_neighborhood(&NewNeighborhood {
            name: " ".into(),
            representative_name: "H".into(),
        })
        .unwrap_err();
        assert!(errors.contains("name"));
        assert!(errors.contains("representative_name"));
    }

    #[test]
    fn test_new_user_role_rules() {
        let mut user = NewUserProfile {
            id: "u-1".into(),
            full_name: "Fatma Şahin".into(),
            email: "fatma@example.org".into(),
            role: Role::NeighborhoodRepresentative,
            neighborhood_id: Some("m-1".into()),
        };
        assert!(check_new_user(&user).is_ok());

        user.neighborhood_id = None;
        let errors = check_new_user(&user).unwrap_err();
        assert_eq!(
            errors.get("neighborhood_id"),
            Some(messages::NEIGHBORHOOD_REQUIRED_FOR_ROLE)
        );

        user.role = Role::Administrator;
        assert!(check_new_user(&user).is_ok());

        user.neighborhood_id = Some("m-1".into());
        assert!(check_new_user(&user).unwrap_err().contains("neighborhood_id"));
    }

    #[test]
    fn test_new_user_email() {
        let mut user = NewUserProfile {
            id: "u-1".into(),
            full_name: "Ali Kaya".into(),
            email: "ali@".into(),
            role: Role::Administrator,
            neighborhood_id: None,
        };
        assert!(check_new_user(&user).unwrap_err().contains("email"));
        user.email = "ali kaya@example.org".into();
        assert!(check_new_user(&user).unwrap_err().contains("email"));
        user.email = " ali@example.org ".into();
        assert!(check_new_user(&user).is_ok());
    }

    #[test]
    fn test_validation_errors_display() {
        let errors = ValidationErrors::single("address", "too short");
        assert_eq!(errors.to_string(), "address: too short");
    }
}
