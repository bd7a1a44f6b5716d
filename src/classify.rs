/// Line classifiers for the blocks cut out of a breakdown section.

/// Substrings that mark a line as naming a test platform.
const PLATFORM_MARKERS: &[&str] = &["android", "linux", "macos", "win"];

/// Trim a line and drop a single leading `*` bullet.
fn clean_line(line: &str) -> &str {
    let trimmed = line.trim();
    match trimmed.strip_prefix('*') {
        Some(rest) => rest.trim(),
        None => trimmed,
    }
}

/// Non-empty, bullet-stripped lines of the repository block, in order.
pub fn breakdown_from(block: &str) -> Vec<String> {
    block
        .split('\n')
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lines of the platform block that name an OS and are not table rows.
pub fn platforms_from(block: &str) -> Vec<String> {
    block
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| PLATFORM_MARKERS.iter().any(|os| line.contains(os)))
        .filter(|line| !line.contains('|'))
        .map(|line| clean_line(line).to_string())
        .collect()
}
