use std::path::Path;
use std::process::{Command, Stdio};

/// Platform command that opens `path` with the default handler.
fn opener(path: &Path) -> Option<Command> {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "linux") {
        Command::new("xdg-open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("rundll32");
        c.arg("url.dll,FileProtocolHandler");
        c
    } else {
        return None;
    };
    cmd.arg(path).stdout(Stdio::null()).stderr(Stdio::null());
    Some(cmd)
}

/// Open the report in a browser. Never fails the run.
pub fn open_in_browser(path: &Path) {
    let Some(mut cmd) = opener(path) else {
        println!("Open {} manually in your browser.", path.display());
        return;
    };
    if let Err(e) = cmd.spawn() {
        tracing::warn!(error = %e, path = %path.display(), "failed to open browser");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_uses_xdg_open() {
        let cmd = opener(Path::new("report.html")).unwrap();
        assert_eq!(cmd.get_program(), "xdg-open");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, vec!["report.html"]);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn macos_uses_open() {
        let cmd = opener(Path::new("report.html")).unwrap();
        assert_eq!(cmd.get_program(), "open");
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn windows_uses_file_protocol_handler() {
        let cmd = opener(Path::new("report.html")).unwrap();
        assert_eq!(cmd.get_program(), "rundll32");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, vec!["url.dll,FileProtocolHandler", "report.html"]);
    }
}
