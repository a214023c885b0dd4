use std::fmt::Write as _;

use super::{encode, Station};
use crate::{Reading, SOFTWARE, VERSION};

/// inHg to tenths of a millibar
const INHG_TO_TENTH_MBAR: f64 = 33.8638866666667 * 10.0;

/// Build the one-line position + weather report for `station`.
///
/// `day_rain` is passed separately so callers can substitute a computed daily
/// total for the station's own counter.
pub fn weather_report(station: &Station, reading: &Reading, day_rain: f32) -> String {
    let mut line = String::with_capacity(128);
    // infallible: fmt::Write for String
    let _ = write!(
        line,
        "{}>APRS,TCPIP:!{}{}{}{}",
        station.callsign,
        encode::latitude(station.latitude),
        station.symbol_table,
        encode::longitude(station.longitude),
        station.symbol_code,
    );
    let _ = write!(
        line,
        "{:03}/{:03}g...t{:03}P{:03}h{:02}b{:05}",
        reading.wind_dir as i64,
        reading.wind_speed as i64,
        reading.out_temp as i64,
        (day_rain as f64 * 100.0) as i64,
        humidity(reading.out_humidity),
        (reading.barometer as f64 * INHG_TO_TENTH_MBAR) as i64,
    );
    let _ = write!(line, ".{SOFTWARE}-{VERSION}");
    if let Some(comment) = &station.comment {
        let _ = write!(line, " {comment}");
    }
    line
}

/// APRS encodes 100% humidity as `h00`
fn humidity(percent: f32) -> i64 {
    match percent as i64 {
        h if h >= 100 => 0,
        h => h.max(0),
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn station(comment: Option<&str>) -> Station {
        Station {
            name: "backyard".into(),
            callsign: "N0CALL-13".into(),
            passcode: 13023,
            latitude: 49.5,
            longitude: -72.75,
            symbol_table: '/',
            symbol_code: '_',
            comment: comment.map(str::to_string),
        }
    }

    #[test]
    fn full_report_line() {
        let mut r = Reading::new("backyard", Utc::now());
        r.wind_dir = 225.7;
        r.wind_speed = 7.9;
        r.out_temp = 68.4;
        r.out_humidity = 54.0;
        r.barometer = 30.0;
        let line = weather_report(&station(None), &r, 0.25);
        assert_eq!(
            line,
            format!("N0CALL-13>APRS,TCPIP:!4930.00N/07245.00W_225/007g...t068P025h54b10159.{SOFTWARE}-{VERSION}")
        );
    }

    #[test]
    fn negative_temp_and_saturated_humidity() {
        let mut r = Reading::new("backyard", Utc::now());
        r.out_temp = -5.2;
        r.out_humidity = 100.0;
        r.barometer = 29.5;
        let line = weather_report(&station(Some("Backyard WX")), &r, 0.0);
        assert!(line.contains("t-05P000h00b09989"), "{line}");
        assert!(line.ends_with(&format!(".{SOFTWARE}-{VERSION} Backyard WX")));
    }
}
