// Helper method to format bytes in human-readable form
pub fn bytes2hr(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Size of an `m`-bit array, rounded up to whole bytes.
pub fn bits2hr(bits: usize) -> String {
    bytes2hr(bits.div_ceil(8))
}
