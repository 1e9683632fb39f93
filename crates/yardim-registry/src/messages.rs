//! Human-readable (Turkish) messages shown to end users.
//!
//! Machine-readable codes are the contract; these strings are presentation only.

pub const TC_REQUIRED: &str = "TC Kimlik No zorunludur";
pub const TC_INVALID: &str = "Geçerli bir TC Kimlik No giriniz";
pub const GIVEN_NAME_REQUIRED: &str = "Ad zorunludur";
pub const GIVEN_NAME_TOO_SHORT: &str = "Ad en az 2 karakter olmalıdır";
pub const FAMILY_NAME_REQUIRED: &str = "Soyad zorunludur";
pub const FAMILY_NAME_TOO_SHORT: &str = "Soyad en az 2 karakter olmalıdır";
pub const ADDRESS_REQUIRED: &str = "Adres zorunludur";
pub const ADDRESS_TOO_SHORT: &str = "Adres en az 10 karakter olmalıdır";
pub const PHONE_INVALID: &str = "Geçerli bir telefon numarası giriniz";
pub const NEIGHBORHOOD_MISSING: &str = "Mahalle bilgisi bulunamadı";
pub const REGISTRANT_MISSING: &str = "Kaydeden kullanıcı bilgisi bulunamadı";
pub const FORM_INVALID: &str = "Form bilgilerini kontrol ediniz";
pub const ADMITTED: &str = "Kayıt başarıyla eklendi";
pub const STORE_FAILURE: &str = "Kayıt eklenirken bir hata oluştu, lütfen tekrar deneyiniz";
pub const NEIGHBORHOOD_NAME_REQUIRED: &str = "Mahalle adı zorunludur";
pub const REPRESENTATIVE_NAME_REQUIRED: &str = "Mahalle başkanı adı zorunludur";
pub const USER_ID_REQUIRED: &str = "Kullanıcı kimliği zorunludur";
pub const FULL_NAME_REQUIRED: &str = "Ad soyad zorunludur";
pub const EMAIL_INVALID: &str = "Geçerli bir e-posta adresi giriniz";
pub const NEIGHBORHOOD_REQUIRED_FOR_ROLE: &str = "Bu rol için mahalle seçilmelidir";
pub const NEIGHBORHOOD_NOT_ALLOWED_FOR_ADMIN: &str = "Yönetici hesabına mahalle atanamaz";

/// Rejection message for a duplicate identity number.
///
/// `neighborhood` is the neighborhood of the existing record, when the reader
/// is allowed to see it.
pub fn duplicate_reason(neighborhood: Option<&str>) -> String {
    match neighborhood {
        Some(name) => format!(
            "Bu TC Kimlik No ile {} mahallesinde daha önce kayıt yapılmış",
            name
        ),
        None => "Bu TC Kimlik No ile daha önce kayıt yapılmış".to_string(),
    }
}

/// Display label for a role code.
pub fn role_label(code: &str) -> &str {
    match code {
        "admin" => "Yönetici",
        "mahalle_baskani" => "Mahalle Başkanı",
        "kullanici" => "Kullanıcı",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_reason_mentions_neighborhood() {
        let msg = duplicate_reason(Some("Yeşiltepe"));
        assert!(msg.contains("Yeşiltepe"));
        assert!(!duplicate_reason(None).contains("mahallesinde"));
    }

    #[test]
    fn test_role_label() {
        assert_eq!(role_label("admin"), "Yönetici");
        assert_eq!(role_label("mahalle_baskani"), "Mahalle Başkanı");
        assert_eq!(role_label("unknown"), "unknown");
    }
}
