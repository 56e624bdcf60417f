use crate::utils::validate_worker_url;

/// Validate the inference worker settings
pub fn validate_worker(url: &str, timeout_seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    validate_worker_url(url).map_err(|e| format!("Invalid worker URL '{url}': {e}"))?;

    if timeout_seconds == 0 {
        return Err("Worker timeout must be greater than 0 seconds".into());
    }

    Ok(())
}

/// Validate the listening port
pub fn validate_port(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    if port == 0 {
        return Err("Server port must be non-zero".into());
    }
    Ok(())
}
