//! Encoded-polyline codec
//!
//! Google polyline algorithm over fixed-point coordinates. Precision 5
//! truncates the internal 1e6 representation to 1e5 before delta-encoding;
//! precision 6 encodes the internal representation directly.

use crate::geo::FixedLatLon;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolylinePrecision {
    Five,
    Six,
}

impl PolylinePrecision {
    /// Divisor from internal 1e6 fixed point down to the wire precision.
    fn divisor(self) -> i32 {
        match self {
            PolylinePrecision::Five => 10,
            PolylinePrecision::Six => 1,
        }
    }
}

pub fn encode(coordinates: &[FixedLatLon], precision: PolylinePrecision) -> String {
    let div = precision.divisor();
    let mut output = String::with_capacity(coordinates.len() * 10);
    let mut last_lat = 0i32;
    let mut last_lon = 0i32;

    for c in coordinates {
        let lat = c.lat / div;
        let lon = c.lon / div;
        encode_number(lat - last_lat, &mut output);
        encode_number(lon - last_lon, &mut output);
        last_lat = lat;
        last_lon = lon;
    }

    output
}

pub fn decode(encoded: &str, precision: PolylinePrecision) -> Option<Vec<FixedLatLon>> {
    let div = precision.divisor();
    let bytes = encoded.as_bytes();
    let mut coordinates = Vec::new();
    let mut index = 0usize;
    let mut lat = 0i32;
    let mut lon = 0i32;

    while index < bytes.len() {
        lat = lat.checked_add(decode_number(bytes, &mut index)?)?;
        lon = lon.checked_add(decode_number(bytes, &mut index)?)?;
        coordinates.push(FixedLatLon::new(
            lat.checked_mul(div)?,
            lon.checked_mul(div)?,
        ));
    }

    Some(coordinates)
}

fn encode_number(value: i32, output: &mut String) {
    let mut v: u32 = if value < 0 {
        !((value as u32) << 1)
    } else {
        (value as u32) << 1
    };
    while v >= 0x20 {
        output.push((((v & 0x1f) | 0x20) as u8 + 63) as char);
        v >>= 5;
    }
    output.push((v as u8 + 63) as char);
}

fn decode_number(bytes: &[u8], index: &mut usize) -> Option<i32> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    loop {
        let b = (*bytes.get(*index)?).checked_sub(63)? as u32;
        *index += 1;
        result |= (b & 0x1f) << shift;
        shift += 5;
        if b < 0x20 {
            break;
        }
        if shift > 30 {
            return None;
        }
    }
    let value = if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Some(value as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<FixedLatLon> {
        vec![
            FixedLatLon::from_degrees(40.714701, -73.990171),
            FixedLatLon::from_degrees(40.717571, -73.991801),
            FixedLatLon::from_degrees(40.715651, -73.985751),
        ]
    }

    #[test]
    fn test_polyline5_reference_string() {
        let encoded = encode(&fixture(), PolylinePrecision::Five);
        assert_eq!(encoded, "{aowFperbM}PdI~Jyd@");
    }

    #[test]
    fn test_polyline5_decode_reference() {
        let decoded = decode("{aowFperbM}PdI~Jyd@", PolylinePrecision::Five).unwrap();
        let expected: Vec<FixedLatLon> = fixture()
            .iter()
            .map(|c| FixedLatLon::new(c.lat / 10 * 10, c.lon / 10 * 10))
            .collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_polyline6_roundtrip_exact() {
        let coords = fixture();
        let encoded = encode(&coords, PolylinePrecision::Six);
        let decoded = decode(&encoded, PolylinePrecision::Six).unwrap();
        assert_eq!(decoded, coords);
    }

    #[test]
    fn test_roundtrip_within_one_unit() {
        let coords = fixture();
        let decoded = decode(&encode(&coords, PolylinePrecision::Five), PolylinePrecision::Five)
            .unwrap();
        for (a, b) in coords.iter().zip(decoded.iter()) {
            assert!((a.lat - b.lat).abs() <= 10);
            assert!((a.lon - b.lon).abs() <= 10);
        }
    }

    #[test]
    fn test_decode_garbage_is_none() {
        assert!(decode("\u{1}", PolylinePrecision::Five).is_none());
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode(&[], PolylinePrecision::Five), "");
        assert_eq!(
            decode("", PolylinePrecision::Five).unwrap(),
            Vec::<FixedLatLon>::new()
        );
    }
}
