//! Identifier case conversion for generated file names

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UPPER_WORD: Regex = Regex::new(r"(.)([A-Z][a-z]+)").unwrap();
    static ref LOWER_THEN_UPPER: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
}

/// Convert a CamelCase identifier into lower_case_underscore form
///
/// An underscore is inserted before every capitalized word that follows
/// another character, and before every upper case letter preceded by a lower
/// case letter or digit. The result is lower-cased, so the conversion is
/// idempotent.
///
/// ```
/// use rosidl_codegen::naming::convert_camel_case_to_lower_case_underscore;
///
/// assert_eq!(convert_camel_case_to_lower_case_underscore("CameraInfo"), "camera_info");
/// assert_eq!(convert_camel_case_to_lower_case_underscore("IMUData2"), "imu_data2");
/// ```
pub fn convert_camel_case_to_lower_case_underscore(value: &str) -> String {
    let value = UPPER_WORD.replace_all(value, "${1}_${2}");
    let value = LOWER_THEN_UPPER.replace_all(&value, "${1}_${2}");
    value.to_lowercase()
}
