use thiserror::Error;

use crate::config::{AcquisitionConfig, BitOrder};

/// Hex digits per analog channel (one byte, 0..=255).
const ANALOG_DIGITS: usize = 2;
const ANALOG_MAX_CODE: f64 = 255.0;

/// Why a line was skipped. Rejections never end the stream.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("line is {actual} characters wide, expected {expected}")]
    WrongWidth { expected: usize, actual: usize },
    #[error("line contains non-ASCII bytes")]
    NonAscii,
    #[error("invalid hex digit at offset {offset}")]
    InvalidHex { offset: usize },
}

/// One decoded line: analog values in volts, digital values as 0/1.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub analog: Vec<f64>,
    pub digital: Vec<u8>,
}

impl Sample {
    pub fn digital_as_f64(&self) -> Vec<f64> {
        self.digital.iter().map(|&b| f64::from(b)).collect()
    }
}

/// Static description of the fixed-width record `AA..BB..CCCC`.
#[derive(Clone, Debug, PartialEq)]
pub struct LineLayout {
    pub voltage_scale: Vec<f64>,
    pub digital_channels: usize,
    pub digital_width_bits: u32,
    pub bit_order: BitOrder,
}

impl LineLayout {
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self {
            voltage_scale: (0..config.analog_channels)
                .map(|c| config.scale_for(c))
                .collect(),
            digital_channels: config.digital_channels,
            digital_width_bits: config.digital_width_bits,
            bit_order: config.bit_order,
        }
    }

    pub fn analog_channels(&self) -> usize {
        self.voltage_scale.len()
    }

    fn digital_digits(&self) -> usize {
        (self.digital_width_bits / 4) as usize
    }

    /// Exact number of characters a valid line carries (8 for the default layout).
    pub fn line_width(&self) -> usize {
        self.analog_channels() * ANALOG_DIGITS + self.digital_digits()
    }
}

impl Default for LineLayout {
    fn default() -> Self {
        Self::from_config(&AcquisitionConfig::default())
    }
}

/// Pure line decoder; holds no state besides its layout.
#[derive(Clone, Debug, Default)]
pub struct SampleDecoder {
    layout: LineLayout,
}

impl SampleDecoder {
    pub fn new(layout: LineLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &LineLayout {
        &self.layout
    }

    pub fn decode(&self, line: &str) -> Result<Sample, Rejection> {
        // Devices that end lines with CRLF leave the carriage return behind.
        let line = line.strip_suffix('\r').unwrap_or(line);
        let expected = self.layout.line_width();
        if line.len() != expected {
            return Err(Rejection::WrongWidth {
                expected,
                actual: line.len(),
            });
        }
        if !line.is_ascii() {
            return Err(Rejection::NonAscii);
        }

        let mut analog = Vec::with_capacity(self.layout.analog_channels());
        for (channel, scale) in self.layout.voltage_scale.iter().enumerate() {
            let offset = channel * ANALOG_DIGITS;
            let code = parse_hex(&line[offset..offset + ANALOG_DIGITS], offset)?;
            analog.push(scale * code as f64 / ANALOG_MAX_CODE);
        }

        let field_offset = self.layout.analog_channels() * ANALOG_DIGITS;
        let field = parse_hex(&line[field_offset..], field_offset)?;
        let width = self.layout.digital_width_bits;
        let digital = (0..self.layout.digital_channels as u32)
            .map(|j| {
                let shift = match self.layout.bit_order {
                    BitOrder::MsbFirst => width - 1 - j,
                    BitOrder::LsbFirst => j,
                };
                ((field >> shift) & 1) as u8
            })
            .collect();

        Ok(Sample { analog, digital })
    }
}

fn parse_hex(digits: &str, base_offset: usize) -> Result<u32, Rejection> {
    // from_str_radix tolerates a leading '+', the wire format does not.
    if let Some(pos) = digits.bytes().position(|b| !b.is_ascii_hexdigit()) {
        return Err(Rejection::InvalidHex {
            offset: base_offset + pos,
        });
    }
    u32::from_str_radix(digits, 16).map_err(|_| Rejection::InvalidHex {
        offset: base_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decoder() -> SampleDecoder {
        SampleDecoder::default()
    }

    #[test]
    fn all_zero_line() {
        let sample = decoder().decode("00000000").unwrap();
        assert_eq!(sample.analog, vec![0.0, 0.0]);
        assert_eq!(sample.digital, vec![0; 16]);
    }

    #[test]
    fn full_scale_analog() {
        let sample = decoder().decode("ff000000").unwrap();
        assert_relative_eq!(sample.analog[0], 5.0);
        assert_relative_eq!(sample.analog[1], 0.0);
        let sample = decoder().decode("0080FFFF").unwrap();
        assert_relative_eq!(sample.analog[1], 5.0 * 128.0 / 255.0);
        assert!(sample.digital.iter().all(|&b| b == 1));
    }

    #[test]
    fn channel_zero_reads_top_bit() {
        let sample = decoder().decode("00008000").unwrap();
        assert_eq!(sample.digital[0], 1);
        assert!(sample.digital[1..].iter().all(|&b| b == 0));
        let sample = decoder().decode("00000001").unwrap();
        assert_eq!(sample.digital[15], 1);
        assert!(sample.digital[..15].iter().all(|&b| b == 0));
    }

    #[test]
    fn lsb_first_and_narrow_field() {
        let config = AcquisitionConfig {
            digital_channels: 12,
            digital_width_bits: 12,
            bit_order: BitOrder::LsbFirst,
            ..Default::default()
        };
        let decoder = SampleDecoder::new(LineLayout::from_config(&config));
        assert_eq!(decoder.layout().line_width(), 7);
        let sample = decoder.decode("0000001").unwrap();
        assert_eq!(sample.digital[0], 1);
        let sample = decoder.decode("0000800").unwrap();
        assert_eq!(sample.digital[11], 1);
    }

    #[test]
    fn wrong_width_is_rejected() {
        assert_eq!(
            decoder().decode("0102"),
            Err(Rejection::WrongWidth {
                expected: 8,
                actual: 4
            })
        );
        assert!(decoder().decode("ff00000").is_err());
        assert!(decoder().decode("").is_err());
    }

    #[test]
    fn bad_digits_are_rejected() {
        assert_eq!(
            decoder().decode("0g000000"),
            Err(Rejection::InvalidHex { offset: 1 })
        );
        assert_eq!(
            decoder().decode("+f000000"),
            Err(Rejection::InvalidHex { offset: 0 })
        );
        assert_eq!(
            decoder().decode("0000+fff"),
            Err(Rejection::InvalidHex { offset: 4 })
        );
        assert_eq!(decoder().decode("00é0000"), Err(Rejection::NonAscii));
    }

    #[test]
    fn trailing_carriage_return_is_ignored() {
        let sample = decoder().decode("ff000000\r").unwrap();
        assert_relative_eq!(sample.analog[0], 5.0);
    }
}
