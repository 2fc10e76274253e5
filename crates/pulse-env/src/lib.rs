#![warn(missing_docs)]
//! # pulse-env
//!
//! ## Purpose
//! Classifies the visiting device and describes the page a collector runs on.
//!
//! ## Responsibilities
//! - Derive device class, browser family and OS family from a user-agent.
//! - Carry page facts (URL, referrer, screen and viewport sizes).
//! - Build the registration request and `session_start` payload from them.
//!
//! ## Data flow
//! Host page facts -> [`PageEnvironment`] -> [`classify_user_agent`] ->
//! registration / `session_start` bodies.
//!
//! ## Error model
//! Classification is total: unknown agents map to `Other`/`desktop`.
//!
//! ## Example
//! ```rust
//! use pulse_env::{BrowserFamily, DeviceType, classify_user_agent};
//!
//! let env = classify_user_agent(
//!     "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Version/17.0 Mobile/15E148 Safari/604.1",
//! );
//! assert_eq!(env.device, DeviceType::Mobile);
//! assert_eq!(env.browser, BrowserFamily::Safari);
//! ```

use pulse_core::SessionStartPayload;
use pulse_core::wire::RegistrationRequest;
use serde::Deserialize;
use serde_json::json;

/// Device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// Desktop or laptop.
    Desktop,
    /// Phone.
    Mobile,
    /// Tablet.
    Tablet,
}

impl DeviceType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
        }
    }
}

/// Browser family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    /// Chromium Edge.
    Edge,
    /// Opera.
    Opera,
    /// Firefox.
    Firefox,
    /// Chrome and other Chromium builds.
    Chrome,
    /// Safari.
    Safari,
    /// Anything else.
    Other,
}

impl BrowserFamily {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserFamily::Edge => "Edge",
            BrowserFamily::Opera => "Opera",
            BrowserFamily::Firefox => "Firefox",
            BrowserFamily::Chrome => "Chrome",
            BrowserFamily::Safari => "Safari",
            BrowserFamily::Other => "Other",
        }
    }
}

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Windows.
    Windows,
    /// iOS and iPadOS.
    Ios,
    /// macOS.
    MacOs,
    /// Android.
    Android,
    /// ChromeOS.
    ChromeOs,
    /// Desktop Linux.
    Linux,
    /// Anything else.
    Other,
}

impl OsFamily {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "Windows",
            OsFamily::Ios => "iOS",
            OsFamily::MacOs => "macOS",
            OsFamily::Android => "Android",
            OsFamily::ChromeOs => "ChromeOS",
            OsFamily::Linux => "Linux",
            OsFamily::Other => "Other",
        }
    }
}

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEnvironment {
    /// Device class.
    pub device: DeviceType,
    /// Browser family.
    pub browser: BrowserFamily,
    /// OS family.
    pub os: OsFamily,
}

/// Classifies a user-agent string.
///
/// Order matters: Edge and Opera embed `Chrome/`, Chrome embeds `Safari/`,
/// iOS agents mention `Mac OS X` and Android agents mention `Linux`.
pub fn classify_user_agent(user_agent: &str) -> DeviceEnvironment {
    let ua = user_agent.to_ascii_lowercase();
    DeviceEnvironment {
        device: classify_device(&ua),
        browser: classify_browser(&ua),
        os: classify_os(&ua),
    }
}

fn classify_device(ua: &str) -> DeviceType {
    if ua.contains("ipad")
        || ua.contains("tablet")
        || (ua.contains("android") && !ua.contains("mobile"))
    {
        DeviceType::Tablet
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("ipod") {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    }
}

fn classify_browser(ua: &str) -> BrowserFamily {
    if ua.contains("edg/") {
        BrowserFamily::Edge
    } else if ua.contains("opr/") || ua.contains("opera") {
        BrowserFamily::Opera
    } else if ua.contains("firefox/") || ua.contains("fxios/") {
        BrowserFamily::Firefox
    } else if ua.contains("chrome/") || ua.contains("crios/") {
        BrowserFamily::Chrome
    } else if ua.contains("safari/") {
        BrowserFamily::Safari
    } else {
        BrowserFamily::Other
    }
}

fn classify_os(ua: &str) -> OsFamily {
    if ua.contains("windows") {
        OsFamily::Windows
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        OsFamily::Ios
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        OsFamily::MacOs
    } else if ua.contains("android") {
        OsFamily::Android
    } else if ua.contains(" cros ") {
        OsFamily::ChromeOs
    } else if ua.contains("linux") {
        OsFamily::Linux
    } else {
        OsFamily::Other
    }
}

/// Facts about the page a collector runs on, supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageEnvironment {
    /// Navigator user-agent.
    pub user_agent: String,
    /// Current page URL.
    pub url: String,
    /// Referrer, empty when absent.
    pub referrer: String,
    /// Preferred language.
    pub language: String,
    /// Screen width in pixels.
    pub screen_width: u32,
    /// Screen height in pixels.
    pub screen_height: u32,
    /// Viewport width in CSS pixels.
    pub viewport_width: u32,
    /// Viewport height in CSS pixels.
    pub viewport_height: u32,
}

impl PageEnvironment {
    /// Classifies this page's user-agent.
    pub fn environment(&self) -> DeviceEnvironment {
        classify_user_agent(&self.user_agent)
    }

    /// Builds the session registration body.
    pub fn registration_request(
        &self,
        session_id: &str,
        user_id: Option<&str>,
    ) -> RegistrationRequest {
        let environment = self.environment();
        RegistrationRequest {
            session_id: session_id.to_string(),
            user_id: user_id.map(str::to_string),
            browser: environment.browser.as_str().to_string(),
            os: environment.os.as_str().to_string(),
            device_type: environment.device.as_str().to_string(),
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            url: self.url.clone(),
            referrer: self.referrer.clone(),
            metadata: json!({
                "language": self.language,
                "viewport_width": self.viewport_width,
                "viewport_height": self.viewport_height,
            }),
        }
    }

    /// Builds the heatmap `session_start` payload.
    pub fn session_start_payload(&self) -> SessionStartPayload {
        let environment = self.environment();
        SessionStartPayload {
            url: self.url.clone(),
            referrer: self.referrer.clone(),
            browser: environment.browser.as_str().to_string(),
            os: environment.os.as_str().to_string(),
            device_type: environment.device.as_str().to_string(),
            screen_width: self.screen_width,
            screen_height: self.screen_height,
        }
    }
}
