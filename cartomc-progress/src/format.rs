use std::time::Duration;

/// Shown when throughput is still zero and no ETA can be derived.
pub const UNKNOWN_TIME: &str = "--:--:--";

pub const DEFAULT_PROGRESS: &str =
    "Rendered {current_chunks}/{total_chunks} chunks ({percent}) of {world} in {elapsed}, ETA {eta} ({rate} cps)";
pub const DEFAULT_PROGRESS_WITH_REGIONS: &str = "Rendered {current_regions}/{total_regions} regions, \
     {current_chunks}/{total_chunks} chunks ({percent}) of {world} in {elapsed}, ETA {eta} ({rate} cps)";

/// Progress line templates. Placeholders: `{world}`, `{current_regions}`,
/// `{total_regions}`, `{current_chunks}`, `{total_chunks}`, `{percent}`,
/// `{elapsed}`, `{eta}`, `{rate}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMessages {
    pub progress: String,
    pub progress_with_regions: String,
}

impl Default for ProgressMessages {
    fn default() -> Self {
        Self {
            progress: DEFAULT_PROGRESS.to_string(),
            progress_with_regions: DEFAULT_PROGRESS_WITH_REGIONS.to_string(),
        }
    }
}

/// `HH:MM:SS`. Hours keep counting past 24.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

pub fn format_eta(eta: Option<Duration>) -> String {
    eta.map(format_hms).unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

/// Substitute `{name}` placeholders. Unknown placeholders are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}
