//! Curve backend on top of the `k256` crate

use super::CurveBackend;
use crate::arith::{int_from_bytes, int_to_bytes, Curve, Point, Scalar, COMPRESSED_POINT_LEN};
use crate::{Error, Result};
use k256::{
    elliptic_curve::{
        bigint::U256,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
    },
    AffinePoint, EncodedPoint, ProjectivePoint,
};

/// Optimized backend; converts through SEC1 encodings at the boundary.
#[derive(Debug, Clone, Default)]
pub struct K256Backend {
    curve: Curve,
}

impl K256Backend {
    pub fn new() -> Self {
        Self::default()
    }

    fn to_projective(&self, point: &Point) -> Result<ProjectivePoint> {
        let (x, y) = match point {
            Point::Infinity => return Ok(ProjectivePoint::IDENTITY),
            Point::Affine { x, y } => (x, y),
        };
        let encoded = EncodedPoint::from_affine_coordinates(
            &int_to_bytes(x).into(),
            &int_to_bytes(y).into(),
            false,
        );
        let affine_opt = AffinePoint::from_encoded_point(&encoded);
        let affine: AffinePoint =
            Option::<AffinePoint>::from(affine_opt).ok_or(Error::PointNotOnCurve)?;
        Ok(ProjectivePoint::from(affine))
    }

    fn from_projective(&self, point: &ProjectivePoint) -> Point {
        if *point == ProjectivePoint::IDENTITY {
            return Point::Infinity;
        }
        let encoded = point.to_affine().to_encoded_point(false);
        let bytes = encoded.as_bytes();
        Point::Affine {
            x: int_from_bytes(&bytes[1..33]),
            y: int_from_bytes(&bytes[33..65]),
        }
    }

    fn to_scalar(&self, k: &Scalar) -> k256::Scalar {
        let bytes = int_to_bytes(&self.curve.reduce_scalar(k));
        <k256::Scalar as Reduce<U256>>::reduce_bytes(&bytes.into())
    }
}

impl CurveBackend for K256Backend {
    fn curve(&self) -> &Curve {
        &self.curve
    }

    fn add(&self, a: &Point, b: &Point) -> Result<Point> {
        let sum = self.to_projective(a)? + self.to_projective(b)?;
        Ok(self.from_projective(&sum))
    }

    fn mul(&self, k: &Scalar, point: &Point) -> Result<Point> {
        let product = self.to_projective(point)? * self.to_scalar(k);
        Ok(self.from_projective(&product))
    }

    fn mul_base(&self, k: &Scalar) -> Result<Point> {
        let product = ProjectivePoint::GENERATOR * self.to_scalar(k);
        Ok(self.from_projective(&product))
    }

    fn is_on_curve(&self, point: &Point) -> bool {
        !point.is_infinity() && self.to_projective(point).is_ok()
    }

    fn encode(&self, point: &Point) -> Result<[u8; COMPRESSED_POINT_LEN]> {
        let projective = self.to_projective(point)?;
        if projective == ProjectivePoint::IDENTITY {
            return Err(Error::PointAtInfinity);
        }
        let encoded = projective.to_affine().to_encoded_point(true);
        encoded
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidPointEncoding)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Point> {
        if bytes.len() != COMPRESSED_POINT_LEN || (bytes[0] != 0x02 && bytes[0] != 0x03) {
            return Err(Error::InvalidPointEncoding);
        }
        let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| Error::InvalidPointEncoding)?;
        let affine_opt = AffinePoint::from_encoded_point(&encoded);
        let affine: AffinePoint =
            Option::<AffinePoint>::from(affine_opt).ok_or(Error::InvalidPointEncoding)?;
        Ok(self.from_projective(&ProjectivePoint::from(affine)))
    }
}
