//! URL helpers for building model endpoint addresses.

/// Remove trailing slashes so endpoints can be appended without doubling them.
///
/// ```
/// use personachat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.example.com/v1beta/"), "https://api.example.com/v1beta");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Address of a per-model method, e.g. `models/{model}:streamGenerateContent`.
///
/// A model given with its `models/` resource prefix is accepted as-is.
///
/// ```
/// use personachat::utils::url::model_method_url;
///
/// assert_eq!(
///     model_method_url("https://api.example.com/v1beta/", "gemini-2.5-flash", "streamGenerateContent"),
///     "https://api.example.com/v1beta/models/gemini-2.5-flash:streamGenerateContent"
/// );
/// ```
pub fn model_method_url(base_url: &str, model: &str, method: &str) -> String {
    let model = model.trim().trim_start_matches('/');
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!("{}/models/{}:{}", normalize_base_url(base_url), model, method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.example.com/v1"),
            "https://api.example.com/v1"
        );
        assert_eq!(
            normalize_base_url("https://api.example.com/v1///"),
            "https://api.example.com/v1"
        );
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_model_method_url_strips_resource_prefix() {
        assert_eq!(
            model_method_url("http://localhost:8080", "models/gemini-3-pro-preview", "streamGenerateContent"),
            "http://localhost:8080/models/gemini-3-pro-preview:streamGenerateContent"
        );
        assert_eq!(
            model_method_url("http://localhost:8080/", " gemini-2.5-flash ", "countTokens"),
            "http://localhost:8080/models/gemini-2.5-flash:countTokens"
        );
    }
}
