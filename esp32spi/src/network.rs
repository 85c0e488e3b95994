//! Network descriptors.
//!
//! A record produced by a scan carries cached per-field snapshots; a record
//! describing the current association holds nothing and answers every query
//! live against the co-processor. Each accessor falls back per field, so a
//! partially-populated scan record still works.

use crate::backend::{Clock, ControlPins, SpiTransport};
use crate::driver::SpiDriver;
use crate::{Error, Vec};

/// One access point, either snapshotted from a scan or the live current
/// association.
#[derive(Debug, Clone, Default)]
pub struct NetworkRecord {
    ssid: Option<Vec<u8>>,
    bssid: Option<[u8; 6]>,
    rssi: Option<i32>,
    channel: Option<u8>,
    country: Option<Vec<u8>>,
    authmode: Option<u8>,
}

impl NetworkRecord {
    /// An empty record: every accessor queries the co-processor for the
    /// current association.
    pub fn current() -> Self {
        Self::default()
    }

    /// A record snapshotted from scan results. Missing fields fall back to
    /// live queries.
    pub fn from_scan(
        ssid: Vec<u8>,
        bssid: Option<[u8; 6]>,
        rssi: Option<i32>,
        channel: Option<u8>,
        authmode: Option<u8>,
    ) -> Self {
        Self {
            ssid: Some(ssid),
            bssid,
            rssi,
            channel,
            country: None,
            authmode,
        }
    }

    pub fn set_country(&mut self, country: Vec<u8>) {
        self.country = Some(country);
    }

    /// Regulatory country code, when known. The scan protocol does not
    /// report one, so this is only set by the caller.
    pub fn country(&self) -> Option<&[u8]> {
        self.country.as_deref()
    }

    pub fn ssid<S, P, C>(
        &self,
        driver: &mut SpiDriver<S, P, C>,
    ) -> Result<Vec<u8>, Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        match &self.ssid {
            Some(ssid) => Ok(ssid.clone()),
            None => driver.current_ssid(),
        }
    }

    pub fn bssid<S, P, C>(
        &self,
        driver: &mut SpiDriver<S, P, C>,
    ) -> Result<[u8; 6], Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        match self.bssid {
            Some(bssid) => Ok(bssid),
            None => driver.current_bssid(),
        }
    }

    pub fn rssi<S, P, C>(&self, driver: &mut SpiDriver<S, P, C>) -> Result<i32, Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        match self.rssi {
            Some(rssi) => Ok(rssi),
            None => driver.current_rssi(),
        }
    }

    /// Channel number, if the scan reported one. Live association queries
    /// cannot recover the channel, so an empty record reports zero.
    pub fn channel(&self) -> u8 {
        self.channel.unwrap_or(0)
    }

    pub fn authmode_byte<S, P, C>(
        &self,
        driver: &mut SpiDriver<S, P, C>,
    ) -> Result<u8, Error<S::Error>>
    where
        S: SpiTransport,
        P: ControlPins,
        C: Clock,
    {
        match self.authmode {
            Some(authmode) => Ok(authmode),
            None => driver.current_enct(),
        }
    }

    /// Human-readable auth mode for a NINA encryption-type byte.
    pub fn authmode_str(authmode: u8) -> &'static str {
        match authmode {
            7 => "OPEN",
            5 => "WEP",
            2 => "PSK",
            4 => "WPA2",
            _ => "UNKNOWN",
        }
    }
}
