use super::*;

#[test]
fn checksum_is_stable_and_order_sensitive() {
    let a = checksum(b"facewarp");
    let mut h = Fnv1a64::new_default();
    h.write_bytes(b"face");
    h.write_bytes(b"warp");
    assert_eq!(a, h.finish());
    assert_ne!(checksum(&[1, 2]), checksum(&[2, 1]));
}

#[test]
fn perp_rotates_ccw() {
    assert_eq!(perp(Vec2::new(1.0, 0.0)), Vec2::new(0.0, 1.0));
    assert_eq!(perp(Vec2::new(2.0, 3.0)), Vec2::new(-3.0, 2.0));
}

#[test]
fn bilerp_hits_corners_exactly() {
    let (a, b, c, d) = (1.0, 2.0, 3.0, 4.0);
    assert_eq!(bilerp(a, b, c, d, 0.0, 0.0), a);
    assert_eq!(bilerp(a, b, c, d, 1.0, 0.0), b);
    assert_eq!(bilerp(a, b, c, d, 0.0, 1.0), c);
    assert_eq!(bilerp(a, b, c, d, 1.0, 1.0), d);
    assert!((bilerp(a, b, c, d, 0.5, 0.5) - 2.5).abs() < 1e-12);
}

#[test]
fn round_to_u8_saturates() {
    assert_eq!(round_to_u8(-3.0), 0);
    assert_eq!(round_to_u8(254.6), 255);
    assert_eq!(round_to_u8(300.0), 255);
    assert_eq!(round_to_u8(12.4999), 12);
}
