use crate::core::{Device, LanguageCode};

use super::ClassifierKind;

/// Parse a compute device name, naming the offending source on error
pub(crate) fn parse_device(value: &str, source: &str) -> Result<Device, String> {
    Device::parse(value).ok_or_else(|| {
        format!("Invalid {source} value '{value}': expected one of auto, cpu, cuda, mps")
    })
}

/// Parse a canonical backend language such as `EN` or `zh`
pub(crate) fn parse_language(value: &str, source: &str) -> Result<LanguageCode, String> {
    LanguageCode::from_canonical(value).ok_or_else(|| {
        let supported: Vec<&str> = LanguageCode::all().iter().map(|l| l.as_str()).collect();
        format!(
            "Invalid {source} value '{value}': expected one of {}",
            supported.join(", ")
        )
    })
}

pub(crate) fn parse_classifier(value: &str, source: &str) -> Result<ClassifierKind, String> {
    ClassifierKind::parse(value)
        .ok_or_else(|| format!("Invalid {source} value '{value}': expected script or worker"))
}

/// Treat empty strings as unset
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(parse_device("cuda", "SYNTH_DEVICE").unwrap(), Device::Cuda);
        let err = parse_device("tpu", "SYNTH_DEVICE").unwrap_err();
        assert!(err.contains("SYNTH_DEVICE"));
    }

    #[test]
    fn test_parse_language() {
        assert_eq!(parse_language("zh", "DEFAULT_LANGUAGE").unwrap(), LanguageCode::Zh);
        assert!(parse_language("DE", "DEFAULT_LANGUAGE").is_err());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" x ".into())), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
