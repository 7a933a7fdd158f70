//! Product info structure
//!
//! Payload of the UID response: product line, id, the controller UID and
//! the model name.

use serde::{Deserialize, Serialize};

use crate::consts::ProductType;
use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;
use crate::uid::render_uid;

/// Product info reported by the UID response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_type: ProductType,
    pub id: u16,
    /// Raw UID bytes as carried on the wire
    pub uid: Vec<u8>,
    pub logo: u16,
    pub image: u16,
    pub model: String,
}

impl ProductInfo {
    /// UID rendered the way controller displays show it
    pub fn uid_text(&self) -> String {
        render_uid(&self.uid)
    }
}

/// Expand factory model abbreviations ("EM 350P2" -> "ecoMAX 350P2")
pub fn format_model_name(model_name: &str) -> String {
    let trimmed = model_name.trim();
    let prefix: String = trimmed.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let rest = trimmed[prefix.len()..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    // The factory form is letters, a digit run of three or more, then a
    // non-empty suffix; anything else stays as reported
    if prefix.is_empty() || digits.len() < 3 || rest.len() == digits.len() {
        return model_name.to_string();
    }

    let device = if prefix.eq_ignore_ascii_case("EM") {
        "ecoMAX"
    } else {
        prefix.as_str()
    };
    format!("{device} {}", rest)
}

pub fn decode(cursor: &mut Cursor<'_>) -> Result<ProductInfo> {
    let product_type = ProductType::from_byte(cursor.read_u8()?);
    let id = cursor.read_u16()?;
    let uid = cursor.read_var_bytes()?.to_vec();
    let logo = cursor.read_u16()?;
    let image = cursor.read_u16()?;
    let model = format_model_name(&cursor.read_var_string()?);

    Ok(ProductInfo {
        product_type,
        id,
        uid,
        logo,
        image,
        model,
    })
}

pub fn encode(writer: &mut PayloadWriter, info: &ProductInfo) {
    writer.put_u8(info.product_type.as_byte());
    writer.put_u16(info.id);
    writer.put_var_bytes(&info.uid);
    writer.put_u16(info.logo);
    writer.put_u16(info.image);
    writer.put_var_string(&info.model);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let info = ProductInfo {
            product_type: ProductType::EcomaxP,
            id: 51,
            uid: vec![0x16, 0x01, 0x11, 0x02, 0x04, 0x30, 0x05, 0x4A, 0x44, 0x30, 0x30],
            logo: 27,
            image: 11,
            model: "ecoMAX 350P2-ZF".to_string(),
        };

        let mut writer = PayloadWriter::new();
        encode(&mut writer, &info);

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(decode(&mut cursor).unwrap(), info);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_model_name_expansion() {
        assert_eq!(format_model_name("EM 350P2-ZF"), "ecoMAX 350P2-ZF");
        assert_eq!(format_model_name("EM350P2"), "ecoMAX 350P2");
        assert_eq!(format_model_name("ecoMAX 860P3-O"), "ecoMAX 860P3-O");
        // Too few digits: left untouched
        assert_eq!(format_model_name("EM 35"), "EM 35");
        // Nothing after the digit run: left untouched
        assert_eq!(format_model_name("EM350"), "EM350");
        assert_eq!(format_model_name("EM 350"), "EM 350");
        assert_eq!(format_model_name(""), "");
    }

    #[test]
    fn test_uid_text() {
        let info = ProductInfo {
            product_type: ProductType::EcomaxP,
            id: 1,
            uid: vec![0xDE, 0xAD],
            logo: 0,
            image: 0,
            model: String::new(),
        };
        assert!(!info.uid_text().is_empty());
    }
}
