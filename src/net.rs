//! Connectivity tracking and the background probe
//!
//! The device starts offline and a periodic TCP probe flips a shared flag.
//! The detect loop reads the flag synchronously; on the offline-to-online
//! edge the probe task plays the connected cue and fetches a one-shot
//! weather status for the idle screen.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::audio::PlayerHandle;
use crate::config::Config;
use crate::ui::UiHandle;
use crate::{Error, Result};

/// How long one probe connect attempt may take
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Request timeout for the weather fetch; a status line is not worth
/// holding the probe cycle for as long as a pipeline request
pub const WEATHER_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared online/offline flag, written by the probe task
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    /// Create a tracker in the offline state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the network was reachable at the last probe
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Record a probe outcome
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

/// Run the connectivity probe until the runtime shuts down
///
/// Each cycle attempts one TCP connect to the configured probe address. On
/// the offline-to-online transition the connected cue plays, the UI is
/// notified, and (first time only) the weather status is fetched.
pub async fn probe_loop(
    config: Config,
    connectivity: Connectivity,
    ui: UiHandle,
    player: PlayerHandle,
    client: reqwest::Client,
) {
    let interval = Duration::from_secs(config.probe_interval_secs.max(1));
    let mut weather_shown = false;

    loop {
        let online = probe_once(&config.probe_addr).await;
        let was_online = connectivity.is_online();

        if online != was_online {
            connectivity.set_online(online);
            ui.update_connectivity(online);
            tracing::info!(online, "connectivity changed");

            if online {
                player.play(&config.sounds.connected);
                if !weather_shown {
                    if let Some(url) = &config.services.weather_url {
                        match fetch_weather(&client, url).await {
                            Ok((city, summary)) => {
                                ui.show_weather(city, summary);
                                weather_shown = true;
                            }
                            Err(e) => tracing::warn!(error = %e, "weather fetch failed"),
                        }
                    }
                }
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// One TCP connect attempt to the probe address
async fn probe_once(addr: &str) -> bool {
    let Ok(target) = addr.parse::<SocketAddr>() else {
        tracing::warn!(addr, "invalid probe address");
        return false;
    };
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(target)).await,
        Ok(Ok(_))
    )
}

/// Fetch the plaintext weather line and split it into city and summary
async fn fetch_weather(client: &reqwest::Client, url: &str) -> Result<(String, String)> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    parse_weather(&body)
}

/// Parse `city: temp, condition` into (city, summary)
fn parse_weather(body: &str) -> Result<(String, String)> {
    let line = body.lines().next().unwrap_or_default().trim();
    let (city, summary) = line
        .split_once(':')
        .ok_or_else(|| Error::Parse(format!("unexpected weather format: {line:?}")))?;
    Ok((city.trim().to_string(), summary.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_offline() {
        let connectivity = Connectivity::new();
        assert!(!connectivity.is_online());
        connectivity.set_online(true);
        assert!(connectivity.is_online());
    }

    #[test]
    fn clones_share_state() {
        let a = Connectivity::new();
        let b = a.clone();
        a.set_online(true);
        assert!(b.is_online());
    }

    #[test]
    fn weather_timeout_is_shorter_than_pipeline_requests() {
        let services = crate::config::ServicesConfig::default();
        assert!(WEATHER_TIMEOUT < services.request_timeout());
    }

    #[test]
    fn weather_line_parses() {
        let (city, summary) = parse_weather("Sheffield: +14°C, Partly cloudy\n").unwrap();
        assert_eq!(city, "Sheffield");
        assert_eq!(summary, "+14°C, Partly cloudy");
    }

    #[test]
    fn weather_without_separator_is_parse_error() {
        assert!(parse_weather("no separator here").is_err());
    }
}
