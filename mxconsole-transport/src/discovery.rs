//! Device discovery for MX Creative Console devices

use std::ffi::CString;
use std::sync::Arc;

use async_trait::async_trait;
use hidapi::HidApi;
use tracing::{debug, info, warn};

use crate::device_registry::{self, DeviceKind, VENDOR_ID};
use crate::error::TransportError;
use crate::hid_raw::HidRawTransport;
use crate::printer::{PrinterConfig, PrinterTransport};
use crate::types::{DiscoveredDevice, TransportDeviceInfo};
use crate::Transport;

/// First vendor-defined HID usage page
const VENDOR_USAGE_PAGE_MIN: u16 = 0xFF00;

/// Device discovery abstraction
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// List currently available devices
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError>;

    /// Open a specific device
    async fn open_device(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

/// hidapi-based discovery
pub struct HidDiscovery {
    /// Known VID/PID pairs and the kind they map to
    known_devices: Vec<(u16, u16, DeviceKind)>,
    /// Optional printer config for monitoring mode - wraps transports automatically
    printer_config: Option<PrinterConfig>,
}

impl Default for HidDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl HidDiscovery {
    /// Create a discovery instance for the registry's known devices
    pub fn new() -> Self {
        Self {
            known_devices: device_registry::KNOWN_DEVICES
                .iter()
                .map(|&(pid, kind)| (VENDOR_ID, pid, kind))
                .collect(),
            printer_config: None,
        }
    }

    /// Create with printer config for monitoring mode
    pub fn with_printer_config(config: PrinterConfig) -> Self {
        Self {
            printer_config: Some(config),
            ..Self::new()
        }
    }

    /// Register an additional Logitech PID
    pub fn add_device(&mut self, pid: u16, kind: DeviceKind) {
        if self.kind_of(VENDOR_ID, pid).is_none() {
            self.known_devices.push((VENDOR_ID, pid, kind));
        }
    }

    fn kind_of(&self, vid: u16, pid: u16) -> Option<DeviceKind> {
        self.known_devices
            .iter()
            .find(|(v, p, _)| *v == vid && *p == pid)
            .map(|(_, _, kind)| *kind)
    }

    fn is_vendor_interface(device_info: &hidapi::DeviceInfo) -> bool {
        device_info.usage_page() >= VENDOR_USAGE_PAGE_MIN
    }

    fn device_info_from(
        device_info: &hidapi::DeviceInfo,
        kind: DeviceKind,
    ) -> TransportDeviceInfo {
        TransportDeviceInfo {
            vid: device_info.vendor_id(),
            pid: device_info.product_id(),
            kind,
            device_path: device_info.path().to_string_lossy().to_string(),
            serial: device_info.serial_number().map(|s| s.to_string()),
            product_name: device_info.product_string().map(|s| s.to_string()),
        }
    }

    fn wrap(&self, transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
        match &self.printer_config {
            Some(config) => PrinterTransport::wrap(transport, config.clone()),
            None => transport,
        }
    }

    /// Open the first discovered device
    pub async fn open_first(&self) -> Result<Arc<dyn Transport>, TransportError> {
        let devices = self.list_devices().await?;
        let device = devices.first().ok_or_else(|| {
            TransportError::DeviceNotFound("No MX Creative Console device found".into())
        })?;
        self.open_device(device).await
    }

    /// Open an explicit hidraw node (e.g. `/dev/hidraw3`)
    ///
    /// The node must belong to a known device unless `kind` is given.
    pub async fn open_path(
        &self,
        path: &str,
        kind: Option<DeviceKind>,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let api = HidApi::new()?;
        let c_path = CString::new(path)
            .map_err(|_| TransportError::DeviceNotFound(format!("invalid path {path:?}")))?;

        let device = api.open_path(&c_path)?;
        let input_device = api.open_path(&c_path).ok();
        let hid_info = device.get_device_info()?;

        let kind = kind
            .or_else(|| self.kind_of(hid_info.vendor_id(), hid_info.product_id()))
            .ok_or_else(|| {
                TransportError::DeviceNotFound(format!(
                    "{path} is {:04X}:{:04X}, not a known console device",
                    hid_info.vendor_id(),
                    hid_info.product_id()
                ))
            })?;

        let mut info = Self::device_info_from(&hid_info, kind);
        info.device_path = path.to_string();

        info!(
            "Opened {} at {} ({:04X}:{:04X})",
            kind, path, info.vid, info.pid
        );
        let transport = Arc::new(HidRawTransport::new(device, input_device, info)?);
        Ok(self.wrap(transport))
    }
}

#[async_trait]
impl DeviceDiscovery for HidDiscovery {
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let api = HidApi::new()?;
        let mut devices: Vec<DiscoveredDevice> = Vec::new();

        for device_info in api.device_list() {
            let vid = device_info.vendor_id();
            let pid = device_info.product_id();

            let Some(kind) = self.kind_of(vid, pid) else {
                continue;
            };

            let path = device_info.path().to_string_lossy().to_string();
            let vendor = Self::is_vendor_interface(device_info);
            debug!(
                "Found interface: VID={:04X} PID={:04X} usage_page={:04X} path={}",
                vid,
                pid,
                device_info.usage_page(),
                path
            );

            // One entry per physical device: prefer the vendor interface
            let serial = device_info.serial_number();
            match devices.iter_mut().find(|d| {
                d.info.vid == vid && d.info.pid == pid && d.info.serial.as_deref() == serial
            }) {
                Some(existing) if vendor => {
                    existing.info = Self::device_info_from(device_info, kind);
                }
                Some(_) => {}
                None => devices.push(DiscoveredDevice {
                    info: Self::device_info_from(device_info, kind),
                }),
            }
        }

        info!("Found {} devices", devices.len());
        Ok(devices)
    }

    async fn open_device(
        &self,
        device: &DiscoveredDevice,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let api = HidApi::new()?;
        let c_path = CString::new(device.info.device_path.as_str()).map_err(|_| {
            TransportError::DeviceNotFound(format!("invalid path {:?}", device.info.device_path))
        })?;

        let output = api.open_path(&c_path)?;
        let input_device = match api.open_path(&c_path) {
            Ok(input) => Some(input),
            Err(e) => {
                warn!("No input handle for {}: {}", device.info.device_path, e);
                None
            }
        };

        info!(
            "Opened {} transport for {:04X}:{:04X} at {}",
            device.info.kind, device.info.vid, device.info.pid, device.info.device_path
        );

        let transport = Arc::new(HidRawTransport::new(
            output,
            input_device,
            device.info.clone(),
        )?);
        Ok(self.wrap(transport))
    }
}
