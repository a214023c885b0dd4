//! Stateless APRS field encoders: uncompressed lat/lon text, Base91 compressed
//! position / course / speed / altitude, Base91 telemetry and the APRS-IS
//! passcode.

use crate::Error;

/// Base91 digits are offset by this much to land in printable ASCII
const BASE91_OFFSET: u8 = 33;

/// `DDMM.mmN` / `DDMM.mmS`
pub fn latitude(lat: f64) -> String {
    let (degrees, hundredths) = degrees_and_minutes(lat);
    let hemisphere = if lat < 0.0 { 'S' } else { 'N' };
    format!(
        "{degrees:02}{:02}.{:02}{hemisphere}",
        hundredths / 100,
        hundredths % 100
    )
}

/// `DDDMM.mmE` / `DDDMM.mmW`
pub fn longitude(lon: f64) -> String {
    let (degrees, hundredths) = degrees_and_minutes(lon);
    let hemisphere = if lon < 0.0 { 'W' } else { 'E' };
    format!(
        "{degrees:03}{:02}.{:02}{hemisphere}",
        hundredths / 100,
        hundredths % 100
    )
}

/// whole degrees and hundredths of a minute of `|value|`, with minutes that
/// round up to 60 carried into the degrees
fn degrees_and_minutes(value: f64) -> (u32, u32) {
    let value = value.abs();
    let mut degrees = value.floor() as u32;
    let mut hundredths = ((value - value.floor()) * 60.0 * 100.0).round() as u32;
    if hundredths >= 6000 {
        degrees += 1;
        hundredths -= 6000;
    }
    (degrees, hundredths)
}

/// Compressed altitude: `x = round(ln(feet) / ln(1.002))`, two Base91 digits,
/// most significant first.
pub fn altitude_compress(feet: f64) -> [u8; 2] {
    let x = round_half_away((feet.ln() / 1.002f64.ln()).max(0.0)) as u32;
    [
        (x / 91) as u8 + BASE91_OFFSET,
        (x % 91) as u8 + BASE91_OFFSET,
    ]
}

/// Compressed course: `round(degrees / 4) + 33`. 360 is north, larger
/// courses wrap around
pub fn course_compress(degrees: u16) -> u8 {
    let degrees = if degrees > 360 { degrees % 360 } else { degrees };
    round_half_away(degrees as f64 / 4.0) as u8 + BASE91_OFFSET
}

/// Compressed speed: ASCII 33 for 1 knot or less, else
/// `round(ln(knots) / ln(1.08)) + 34`.
pub fn speed_compress(knots: f64) -> u8 {
    if knots <= 1.0 {
        return BASE91_OFFSET;
    }
    (round_half_away(knots.ln() / 1.08f64.ln()) as u8).saturating_add(34)
}

pub fn mph_to_knots(mph: f64) -> f64 {
    mph * 0.8689758
}

pub fn lat_precompress(lat: f64) -> f64 {
    380926.0 * (90.0 - lat)
}

pub fn lon_precompress(lon: f64) -> f64 {
    190463.0 * (180.0 + lon)
}

/// four digit big-endian Base91
pub fn encode_base91_position(n: u32) -> [u8; 4] {
    const B3: u32 = 91 * 91 * 91;
    const B2: u32 = 91 * 91;
    [
        (n / B3 % 91) as u8 + BASE91_OFFSET,
        (n % B3 / B2) as u8 + BASE91_OFFSET,
        (n % B2 / 91) as u8 + BASE91_OFFSET,
        (n % 91) as u8 + BASE91_OFFSET,
    ]
}

/// two digit big-endian Base91. values above 8280 (`91 * 91 - 1`) do not fit
pub fn encode_base91_telemetry(n: u16) -> Result<[u8; 2], Error> {
    if n > 8280 {
        return Err(Error::EncodingRange(n));
    }
    Ok([
        (n / 91) as u8 + BASE91_OFFSET,
        (n % 91) as u8 + BASE91_OFFSET,
    ])
}

/// APRS-IS passcode for `callsign`. case and SSID (`-N` suffix) are ignored
pub fn passcode(callsign: &str) -> u16 {
    let base = callsign
        .split('-')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    let mut code: u16 = 0x73e2;
    for pair in base.as_bytes().chunks(2) {
        code ^= (pair[0] as u16) << 8;
        if let Some(low) = pair.get(1) {
            code ^= *low as u16;
        }
    }
    code & 0x7fff
}

fn round_half_away(x: f64) -> f64 {
    if x > 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn passcode_reference_values() {
        assert_eq!(passcode("N0CALL"), 13023);
        assert_eq!(passcode("W1AW"), 25988);
        assert_eq!(passcode("KD7XYZ"), 22180);
    }

    #[test]
    fn passcode_ignores_case_and_ssid() {
        assert_eq!(passcode("n0call"), passcode("N0CALL"));
        assert_eq!(passcode("N0CALL-13"), passcode("N0CALL"));
        assert_eq!(passcode("n0Call-1"), 13023);
    }

    #[test]
    fn telemetry_range() {
        assert_eq!(encode_base91_telemetry(8280).unwrap(), *b"{{");
        assert_eq!(encode_base91_telemetry(0).unwrap(), *b"!!");
        assert!(matches!(
            encode_base91_telemetry(8281),
            Err(Error::EncodingRange(8281))
        ));
    }

    #[test]
    fn compressed_position_example() {
        // worked example from the APRS 1.01 protocol document: 49°30'N 72°45'W => "5L!!" "<*e7"
        let lat = encode_base91_position(lat_precompress(49.5) as u32);
        let lon = encode_base91_position(lon_precompress(-72.75) as u32);
        assert_eq!(&lat, b"5L!!");
        assert_eq!(&lon, b"<*e7");
        assert_eq!(encode_base91_position(0), *b"!!!!");
    }

    #[test]
    fn speed_compression() {
        assert_eq!(speed_compress(1.0), 33);
        assert_eq!(speed_compress(0.5), 33);
        assert_eq!(speed_compress(0.0), 33);
        assert_eq!(speed_compress(10.0), 64);
        let mut last = speed_compress(1.01);
        let mut knots = 1.01;
        while knots < 500.0 {
            let next = speed_compress(knots);
            assert!(next >= last, "not monotonic at {knots} kt");
            last = next;
            knots += 0.37;
        }
    }

    #[test]
    fn course_and_altitude() {
        assert_eq!(course_compress(0), b'!');
        assert_eq!(course_compress(88), b'7');
        assert_eq!(course_compress(360), 123);
        assert_eq!(course_compress(450), course_compress(90));
        assert_eq!(course_compress(u16::MAX), course_compress(u16::MAX % 360));
        assert_eq!(&altitude_compress(5000.0), b"On");
    }

    #[test]
    fn lat_lon_text() {
        assert_eq!(latitude(49.5), "4930.00N");
        assert_eq!(latitude(-33.8675), "3352.05S");
        assert_eq!(latitude(5.1), "0506.00N");
        assert_eq!(longitude(-72.75), "07245.00W");
        assert_eq!(longitude(151.2), "15112.00E");
        // 59.9994 minutes rounds up into the next degree
        assert_eq!(latitude(44.99999), "4500.00N");
    }
}
