//! EPROM Configuration (C1): the immutable fiscal identity record a device is
//! provisioned with at startup, plus the fantasy/header-trailer text banks.
//!
//! Bundled defaults are transcribed from the reference emulator's shipped
//! configuration; a JSON file can override any subset of them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::Counter;
use crate::error::{Error, Result};

/// Fiscal identity burned into the device at provisioning time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Eprom {
    pub razon_social: String,
    pub cuit: String,
    pub ingresos_brutos: String,
    pub inicio_actividades: String,
    pub punto_venta: String,
    pub last_counter_a: u32,
    pub last_counter_b: u32,
    #[serde(default)]
    pub fantasy: BTreeMap<u32, String>,
    #[serde(default)]
    pub header_trailer: BTreeMap<u32, String>,
}

impl Eprom {
    /// The bundled defaults, matching the reference emulator's shipped
    /// configuration verbatim.
    pub fn bundled() -> Self {
        let mut fantasy = BTreeMap::new();
        fantasy.insert(1, "\u{f4}      RIO PLOMO     ".to_string());
        fantasy.insert(2, String::new());

        let mut header_trailer = BTreeMap::new();
        header_trailer.insert(
            1,
            "COLON 125 GODOY CRUZ MENDOZA (M5501ARC)".to_string(),
        );
        header_trailer.insert(2, "ESTAB: 05-0619591-02 - S.TIMB: 01 S.C.".to_string());
        for line in 3..=20 {
            header_trailer.entry(line).or_insert_with(String::new);
        }

        Self {
            razon_social: "CARLOS, AUGUSTO Y GERMAN ROCCASALVA S.H.".to_string(),
            cuit: "30-71128142-4".to_string(),
            ingresos_brutos: "0619591".to_string(),
            inicio_actividades: "02-09-05".to_string(),
            punto_venta: "3".to_string(),
            last_counter_a: 365,
            last_counter_b: 790,
            fantasy,
            header_trailer,
        }
    }

    /// Loads overrides from a JSON file on top of [`Eprom::bundled`]; any
    /// field absent from the file keeps its bundled value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let overrides: EpromOverrides = serde_json::from_str(&contents)
            .map_err(|e| Error::communication(format!("invalid EPROM config: {e}")))?;
        Ok(overrides.apply_to(Self::bundled()))
    }

    pub fn fantasy_line(&self, n: u32) -> &str {
        self.fantasy.get(&n).map(String::as_str).unwrap_or("")
    }

    pub fn header_trailer_line(&self, n: u32) -> &str {
        self.header_trailer.get(&n).map(String::as_str).unwrap_or("")
    }

    pub fn set_header_trailer_line(&mut self, n: u32, text: Option<String>) {
        match text {
            Some(text) => {
                let truncated: String = text.chars().take(40).collect();
                self.header_trailer.insert(n, truncated);
            }
            None => {
                self.header_trailer.insert(n, String::new());
            }
        }
    }

    pub fn last_counter(&self, counter: Counter) -> u32 {
        match counter {
            Counter::A => self.last_counter_a,
            Counter::B => self.last_counter_b,
        }
    }

    /// Records `number` as the last-issued document for `counter`, as
    /// CloseFiscalReceipt does. The identity fields stay fixed for the life
    /// of the device; only the two counters move.
    pub fn bump_counter(&mut self, counter: Counter, number: u32) {
        match counter {
            Counter::A => self.last_counter_a = number,
            Counter::B => self.last_counter_b = number,
        }
    }
}

/// Partial overlay for [`Eprom::load`]; every field is optional so a config
/// file only needs to name what it changes.
#[derive(Default, Deserialize)]
struct EpromOverrides {
    razon_social: Option<String>,
    cuit: Option<String>,
    ingresos_brutos: Option<String>,
    inicio_actividades: Option<String>,
    punto_venta: Option<String>,
    last_counter_a: Option<u32>,
    last_counter_b: Option<u32>,
    #[serde(default)]
    fantasy: BTreeMap<u32, String>,
    #[serde(default)]
    header_trailer: BTreeMap<u32, String>,
}

impl EpromOverrides {
    fn apply_to(self, mut base: Eprom) -> Eprom {
        if let Some(v) = self.razon_social {
            base.razon_social = v;
        }
        if let Some(v) = self.cuit {
            base.cuit = v;
        }
        if let Some(v) = self.ingresos_brutos {
            base.ingresos_brutos = v;
        }
        if let Some(v) = self.inicio_actividades {
            base.inicio_actividades = v;
        }
        if let Some(v) = self.punto_venta {
            base.punto_venta = v;
        }
        if let Some(v) = self.last_counter_a {
            base.last_counter_a = v;
        }
        if let Some(v) = self.last_counter_b {
            base.last_counter_b = v;
        }
        base.fantasy.extend(self.fantasy);
        base.header_trailer.extend(self.header_trailer);
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_matches_reference_fiscal_identity() {
        let eprom = Eprom::bundled();
        assert_eq!(eprom.cuit, "30-71128142-4");
        assert_eq!(eprom.last_counter_a, 365);
        assert_eq!(eprom.last_counter_b, 790);
        assert_eq!(eprom.fantasy_line(1), "\u{f4}      RIO PLOMO     ");
    }

    #[test]
    fn header_trailer_del_char_clears_line() {
        let mut eprom = Eprom::bundled();
        eprom.set_header_trailer_line(1, None);
        assert_eq!(eprom.header_trailer_line(1), "");
    }

    #[test]
    fn header_trailer_set_truncates_to_forty_chars() {
        let mut eprom = Eprom::bundled();
        let long = "x".repeat(60);
        eprom.set_header_trailer_line(3, Some(long));
        assert_eq!(eprom.header_trailer_line(3).chars().count(), 40);
    }

    #[test]
    fn overrides_apply_on_top_of_bundled() {
        let overrides = EpromOverrides {
            cuit: Some("20-12345678-3".to_string()),
            ..Default::default()
        };
        let eprom = overrides.apply_to(Eprom::bundled());
        assert_eq!(eprom.cuit, "20-12345678-3");
        assert_eq!(eprom.razon_social, Eprom::bundled().razon_social);
    }
}
