//! Scalar validators used while parsing setup documents.
use std::net::IpAddr;

/// Validates if a given u16 value is a valid port number.
/// By type, the port is already within the 0-65535 range.
/// This function checks that the port is not 0, which is reserved.
///
/// # Arguments
///
/// * `port` - The u16 value to validate.
///
/// # Returns
///
/// * `Ok(())` if the port is valid.
/// * `Err(&'static str)` if the port is invalid.
pub fn is_valid_port(port: u16) -> Result<(), &'static str> {
    if port > 0 {
        Ok(())
    } else {
        Err("Port number must be greater than 0")
    }
}

/// Validates if a given string is a usable server address: either an IP
/// address or a host name made of dot-separated labels.
///
/// # Arguments
///
/// * `host` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the address is valid.
/// * `Err(&'static str)` if the address is invalid.
pub fn is_valid_host(host: &str) -> Result<(), &'static str> {
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    if host.is_empty() || host.len() > 253 {
        return Err("Host name must be between 1 and 253 characters");
    }
    let labels_ok = host.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    if labels_ok {
        Ok(())
    } else {
        Err("Invalid host name")
    }
}

/// Validates if a given string is a valid file path.
///
/// # Arguments
///
/// * `path` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the file path is valid.
/// * `Err(&'static str)` if the file path is invalid.
pub fn is_valid_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("File path cannot be empty");
    }
    if path.contains('\0') {
        return Err("File path cannot contain null bytes");
    }
    Ok(())
}

/// Validates a module name. Names appear in dotted key paths, so only ASCII
/// letters, digits, `_` and `-` are allowed.
pub fn is_valid_module_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Module name cannot be empty");
    }
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err("Module name may only contain ASCII letters, digits, '_' and '-'")
    }
}

/// Validates a dotted class path such as `spectrometer.spectrometer_logic.SpectrometerLogic`.
pub fn is_valid_class_path(class_path: &str) -> Result<(), &'static str> {
    if class_path.is_empty() {
        return Err("Class path cannot be empty");
    }
    let segments_ok = class_path.split('.').all(|segment| {
        !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
    });
    if segments_ok {
        Ok(())
    } else {
        Err("Class path must be dot-separated identifiers")
    }
}
