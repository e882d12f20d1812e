use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use aguada_embedded::{AuthMode, WifiController};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::errors::GatewayError;

const NMCLI: &str = "nmcli";
const NM_STATE_CONNECTED: u32 = 100;
const MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// Controller for hosts whose uplink is owned by the operating system.
///
/// Association always succeeds and the link is considered up until told otherwise.
#[derive(Debug, Default)]
pub struct StaticController {
    connected: bool,
}

impl StaticController {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WifiController for StaticController {
    type Error = GatewayError;

    async fn start_ap(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        tracing::info!(ssid, "Access point left to the host configuration");
        Ok(())
    }

    async fn connect_station(
        &mut self,
        ssid: &str,
        _password: &str,
        _auth: AuthMode,
    ) -> Result<(), Self::Error> {
        tracing::info!(ssid, "Using host-managed uplink");
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Drives Wi-Fi through NetworkManager's command line client.
///
/// Link loss is detected by a background task polling the device state, since
/// `is_connected` cannot wait on a subprocess. Every association gets a fresh monitor
/// tagged with a generation, so a query still in flight from an earlier link cannot
/// overwrite the state of the current one.
pub struct NmcliController {
    program: String,
    interface: String,
    ap_interface: String,
    connected: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    monitor: Option<JoinHandle<()>>,
}

impl NmcliController {
    pub fn new(interface: impl Into<String>, ap_interface: Option<String>) -> Self {
        let interface = interface.into();
        let ap_interface = ap_interface.unwrap_or_else(|| interface.clone());

        if ap_interface == interface {
            tracing::warn!(
                %interface,
                "Access point and station share one interface; the adapter must support both"
            );
        }

        Self {
            program: NMCLI.to_string(),
            interface,
            ap_interface,
            connected: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            monitor: None,
        }
    }

    /// Uses another `nmcli` executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn start_monitor(&mut self) {
        self.stop_monitor();

        let program = self.program.clone();
        let interface = self.interface.clone();
        let connected = self.connected.clone();
        let generation = self.generation.clone();
        let current = generation.load(Ordering::SeqCst);

        self.monitor = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(MONITOR_INTERVAL).await;

                let args = ["-t", "-f", "GENERAL.STATE", "device", "show", interface.as_str()];
                let up = match nmcli(&program, &args).await {
                    Ok(output) => parse_device_state(&output),
                    Err(e) => {
                        tracing::warn!("Device state query failed: {}", e);
                        false
                    }
                };

                if generation.load(Ordering::SeqCst) != current {
                    break;
                }
                connected.store(up, Ordering::SeqCst);
            }
        }));
    }

    fn stop_monitor(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

impl Drop for NmcliController {
    fn drop(&mut self) {
        self.stop_monitor();
    }
}

impl WifiController for NmcliController {
    type Error = GatewayError;

    async fn start_ap(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        nmcli(
            &self.program,
            &[
                "device",
                "wifi",
                "hotspot",
                "ifname",
                self.ap_interface.as_str(),
                "ssid",
                ssid,
                "password",
                password,
            ],
        )
        .await?;

        Ok(())
    }

    async fn connect_station(
        &mut self,
        ssid: &str,
        password: &str,
        auth: AuthMode,
    ) -> Result<(), Self::Error> {
        let mut args = vec!["device", "wifi", "connect", ssid];
        if auth == AuthMode::Wpa2Personal {
            args.extend(["password", password]);
        }
        args.extend(["ifname", self.interface.as_str()]);

        nmcli(&self.program, &args).await?;

        self.connected.store(true, Ordering::SeqCst);
        self.start_monitor();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.stop_monitor();
        self.connected.store(false, Ordering::SeqCst);
        nmcli(&self.program, &["device", "disconnect", self.interface.as_str()]).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Runs one `nmcli` command. Dropping the returned future kills the child, so an
/// abandoned association attempt cannot complete later.
async fn nmcli(program: &str, args: &[&str]) -> Result<String, GatewayError> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(GatewayError::Command {
            command: redact(args),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Renders a command line for logs with any password argument masked.
fn redact(args: &[&str]) -> String {
    let mut rendered = vec![NMCLI];
    let mut mask_next = false;

    for arg in args {
        rendered.push(if mask_next { "***" } else { *arg });
        mask_next = *arg == "password";
    }

    rendered.join(" ")
}

/// Reads `GENERAL.STATE:<code> (<name>)` from terse `nmcli device show` output.
pub fn parse_device_state(output: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("GENERAL.STATE:"))
        .filter_map(|state| state.split_whitespace().next())
        .any(|code| code.parse::<u32>() == Ok(NM_STATE_CONNECTED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_state() {
        assert!(parse_device_state("GENERAL.STATE:100 (connected)\n"));
        assert!(!parse_device_state("GENERAL.STATE:30 (disconnected)\n"));
        assert!(!parse_device_state("GENERAL.STATE:70 (connecting (getting IP configuration))"));
        assert!(!parse_device_state(""));
    }

    #[test]
    fn test_redact_masks_passwords() {
        assert_eq!(
            redact(&["device", "wifi", "connect", "luciano", "password", "19852012", "ifname", "wlan0"]),
            "nmcli device wifi connect luciano password *** ifname wlan0"
        );
        assert_eq!(
            redact(&["device", "disconnect", "wlan0"]),
            "nmcli device disconnect wlan0"
        );
    }

    /// Writes an `nmcli` stand-in whose association with `slow` takes a second and
    /// leaves a marker file behind when it completes.
    #[cfg(unix)]
    fn slow_nmcli() -> (std::path::PathBuf, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("aguada-nmcli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let marker = dir.join("associated");
        let _ = std::fs::remove_file(&marker);

        let script = dir.join("nmcli");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nif [ \"$3\" = connect ] && [ \"$4\" = slow ]; then\n  sleep 1\n  touch '{}'\nfi\nexit 0\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        (script, marker)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_abandoned_association_is_killed() {
        let (script, marker) = slow_nmcli();
        let mut controller =
            NmcliController::new("wlan0", None).with_program(script.to_string_lossy());

        let attempt = tokio::time::timeout(
            Duration::from_millis(200),
            controller.connect_station("slow", "19852012", AuthMode::Wpa2Personal),
        )
        .await;
        assert!(attempt.is_err());
        assert!(!controller.is_connected());

        controller.disconnect().await.unwrap();
        controller
            .connect_station("luciano", "19852012", AuthMode::Wpa2Personal)
            .await
            .unwrap();
        assert!(controller.is_connected());

        // Long enough for the abandoned attempt to have finished had it survived
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_static_controller() {
        let mut controller = StaticController::new();
        assert!(!controller.is_connected());

        controller
            .connect_station("TP-LINK_BE3344", "", AuthMode::Open)
            .await
            .unwrap();
        assert!(controller.is_connected());

        controller.disconnect().await.unwrap();
        assert!(!controller.is_connected());
    }
}
