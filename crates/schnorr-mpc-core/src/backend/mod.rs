//! Pluggable curve-arithmetic backends
//!
//! The reference arithmetic in [`crate::arith`] is the contract. Alternative
//! backends must produce bit-identical results for the same inputs.

mod k256_backend;

pub use k256_backend::K256Backend;

use crate::arith::{Curve, Point, Scalar, COMPRESSED_POINT_LEN};
use crate::Result;

/// Point operations a Schnorr signer or verifier needs.
pub trait CurveBackend {
    /// Constants and scalar/field helpers
    fn curve(&self) -> &Curve;

    /// a + b
    fn add(&self, a: &Point, b: &Point) -> Result<Point>;

    /// k·P
    fn mul(&self, k: &Scalar, point: &Point) -> Result<Point>;

    /// k·G
    fn mul_base(&self, k: &Scalar) -> Result<Point> {
        self.mul(k, self.curve().generator())
    }

    fn is_on_curve(&self, point: &Point) -> bool;

    fn encode(&self, point: &Point) -> Result<[u8; COMPRESSED_POINT_LEN]>;

    fn decode(&self, bytes: &[u8]) -> Result<Point>;
}

impl CurveBackend for Curve {
    fn curve(&self) -> &Curve {
        self
    }

    fn add(&self, a: &Point, b: &Point) -> Result<Point> {
        Ok(self.point_add(a, b))
    }

    fn mul(&self, k: &Scalar, point: &Point) -> Result<Point> {
        Ok(self.point_mul(k, point))
    }

    fn is_on_curve(&self, point: &Point) -> bool {
        self.on_curve(point)
    }

    fn encode(&self, point: &Point) -> Result<[u8; COMPRESSED_POINT_LEN]> {
        point.to_bytes()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Point> {
        self.decode_point(bytes)
    }
}
