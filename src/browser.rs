use crate::config::BrowserConfig;
use crate::fetch::FetchError;
use std::process::Command;
use tracing::debug;

pub fn render_page(config: &BrowserConfig, url: &str, user_agent: &str) -> Result<String, FetchError> {
    let render_err = |reason: String| FetchError::Render {
        url: url.to_string(),
        reason,
    };

    let mut command = Command::new(&config.command);
    command
        .args(render_args(config, user_agent))
        .args(&config.args)
        .arg(url);
    debug!(command = %config.command, url, "launching headless browser");

    let output = command
        .output()
        .map_err(|err| render_err(format!("failed to launch {}: {err}", config.command)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(render_err(format!(
            "{} exited with {}: {}",
            config.command,
            output.status,
            stderr.lines().last().unwrap_or_default()
        )));
    }

    let html = String::from_utf8_lossy(&output.stdout).into_owned();
    if html.trim().is_empty() {
        return Err(render_err("browser returned an empty document".to_string()));
    }
    Ok(html)
}

fn render_args(config: &BrowserConfig, user_agent: &str) -> Vec<String> {
    vec![
        "--headless=new".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--window-size=1920,1080".to_string(),
        format!("--user-agent={user_agent}"),
        format!("--virtual-time-budget={}", config.render_budget_ms),
        "--dump-dom".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_browser_binary_is_a_render_error() {
        let config = BrowserConfig {
            enabled: true,
            command: "definitely-not-a-browser-binary".to_string(),
            ..BrowserConfig::default()
        };
        let err = render_page(&config, "https://example.com", "ua").expect_err("must fail");
        assert!(matches!(err, FetchError::Render { .. }));
        assert!(err.to_string().contains("failed to launch"));
    }

    #[test]
    fn render_args_carry_user_agent_and_budget() {
        let config = BrowserConfig {
            render_budget_ms: 2500,
            ..BrowserConfig::default()
        };
        let args = render_args(&config, "TestAgent/1.0");
        assert!(args.contains(&"--user-agent=TestAgent/1.0".to_string()));
        assert!(args.contains(&"--virtual-time-budget=2500".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--dump-dom"));
    }
}
