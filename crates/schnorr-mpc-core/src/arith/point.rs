//! Affine points, the chord-and-tangent group law and the compressed codec

use super::{int_from_bytes, int_to_bytes, Curve, FieldElement, Scalar};
use crate::{Error, Result};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Length of a compressed point encoding
pub const COMPRESSED_POINT_LEN: usize = 33;

/// A curve point, or the group identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Point {
    Infinity,
    Affine { x: FieldElement, y: FieldElement },
}

impl Point {
    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    pub fn x(&self) -> Option<&FieldElement> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }

    pub fn y(&self) -> Option<&FieldElement> {
        match self {
            Point::Infinity => None,
            Point::Affine { y, .. } => Some(y),
        }
    }

    /// `0x02 | 0x03` parity prefix followed by the 32-byte big-endian x.
    pub fn to_bytes(&self) -> Result<[u8; COMPRESSED_POINT_LEN]> {
        match self {
            Point::Infinity => Err(Error::PointAtInfinity),
            Point::Affine { x, y } => {
                let mut bytes = [0u8; COMPRESSED_POINT_LEN];
                bytes[0] = 0x02 + u8::from(y.bit(0));
                bytes[1..].copy_from_slice(&int_to_bytes(x));
                Ok(bytes)
            }
        }
    }
}

/// Jacobian coordinates (X/Z², Y/Z³); Z = 0 is infinity.
struct Jacobian {
    x: FieldElement,
    y: FieldElement,
    z: FieldElement,
}

impl Jacobian {
    fn infinity() -> Self {
        Self {
            x: BigUint::one(),
            y: BigUint::one(),
            z: BigUint::zero(),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }
}

impl Curve {
    /// P + Q with the affine chord-and-tangent rule.
    pub fn point_add(&self, a: &Point, b: &Point) -> Point {
        let (x1, y1, x2, y2) = match (a, b) {
            (Point::Infinity, _) => return b.clone(),
            (_, Point::Infinity) => return a.clone(),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
        };

        if x1 == x2 && (y1 != y2 || y1.is_zero()) {
            return Point::Infinity;
        }

        let lambda = if x1 == x2 {
            // 3x² · (2y)^(p-2)
            let numerator = self.field_mul(&BigUint::from(3u32), &self.field_mul(x1, x1));
            let denominator = self.field_add(y1, y1);
            self.field_mul(&numerator, &self.field_invert(&denominator))
        } else {
            // (y2 - y1) · (x2 - x1)^(p-2)
            let numerator = self.field_sub(y2, y1);
            let denominator = self.field_sub(x2, x1);
            self.field_mul(&numerator, &self.field_invert(&denominator))
        };

        let x3 = self.field_sub(&self.field_sub(&self.field_mul(&lambda, &lambda), x1), x2);
        let y3 = self.field_sub(&self.field_mul(&lambda, &self.field_sub(x1, &x3)), y1);
        Point::Affine { x: x3, y: y3 }
    }

    /// -P
    pub fn point_neg(&self, point: &Point) -> Point {
        match point {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::Affine {
                x: x.clone(),
                y: self.field_sub(&BigUint::zero(), y),
            },
        }
    }

    /// k·P by double-and-add, scanning k from the least significant bit.
    ///
    /// Intermediate sums are kept in Jacobian coordinates so only the final
    /// conversion pays for a field inversion.
    pub fn point_mul(&self, k: &Scalar, point: &Point) -> Point {
        let mut acc = Jacobian::infinity();
        let mut addend = self.to_jacobian(point);
        for i in 0..k.bits() {
            if k.bit(i) {
                acc = self.jacobian_add(&acc, &addend);
            }
            addend = self.jacobian_double(&addend);
        }
        self.to_affine(&acc)
    }

    /// k·G
    pub fn mul_base(&self, k: &Scalar) -> Point {
        self.point_mul(k, self.generator())
    }

    /// Sum of a sequence of points
    pub fn sum_points<'a>(&self, points: impl IntoIterator<Item = &'a Point>) -> Point {
        points
            .into_iter()
            .fold(Point::Infinity, |acc, point| self.point_add(&acc, point))
    }

    /// False for infinity; otherwise y² - x³ ≡ 7 (mod p) with canonical coordinates.
    pub fn on_curve(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => false,
            Point::Affine { x, y } => {
                if x >= self.p() || y >= self.p() {
                    return false;
                }
                let y2 = self.field_mul(y, y);
                let x3 = self.field_mul(&self.field_mul(x, x), x);
                self.field_sub(&y2, &x3) == *self.b()
            }
        }
    }

    /// The point with x-coordinate `x` and the requested y parity.
    pub fn lift_x(&self, x: &FieldElement, odd: bool) -> Option<Point> {
        let x3 = self.field_mul(&self.field_mul(x, x), x);
        let y = self.sqrt(&self.field_add(&x3, self.b()))?;
        let y = if y.bit(0) == odd {
            y
        } else {
            self.field_sub(&BigUint::zero(), &y)
        };
        Some(Point::Affine { x: x.clone(), y })
    }

    /// Decode a 33-byte compressed point.
    pub fn decode_point(&self, bytes: &[u8]) -> Result<Point> {
        if bytes.len() != COMPRESSED_POINT_LEN {
            return Err(Error::InvalidPointEncoding);
        }
        let odd = match bytes[0] {
            0x02 => false,
            0x03 => true,
            _ => return Err(Error::InvalidPointEncoding),
        };
        let x = int_from_bytes(&bytes[1..]);
        if &x >= self.p() {
            return Err(Error::InvalidPointEncoding);
        }
        self.lift_x(&x, odd).ok_or(Error::InvalidPointEncoding)
    }

    fn to_jacobian(&self, point: &Point) -> Jacobian {
        match point {
            Point::Infinity => Jacobian::infinity(),
            Point::Affine { x, y } => Jacobian {
                x: x.clone(),
                y: y.clone(),
                z: BigUint::one(),
            },
        }
    }

    fn to_affine(&self, point: &Jacobian) -> Point {
        if point.is_infinity() {
            return Point::Infinity;
        }
        let z_inv = self.field_invert(&point.z);
        let z_inv2 = self.field_mul(&z_inv, &z_inv);
        let z_inv3 = self.field_mul(&z_inv2, &z_inv);
        Point::Affine {
            x: self.field_mul(&point.x, &z_inv2),
            y: self.field_mul(&point.y, &z_inv3),
        }
    }

    fn jacobian_double(&self, point: &Jacobian) -> Jacobian {
        if point.is_infinity() || point.y.is_zero() {
            return Jacobian::infinity();
        }
        let yy = self.field_mul(&point.y, &point.y);
        // S = 4·X·Y²
        let s = self.field_mul(&BigUint::from(4u32), &self.field_mul(&point.x, &yy));
        // M = 3·X²
        let m = self.field_mul(&BigUint::from(3u32), &self.field_mul(&point.x, &point.x));
        let x3 = self.field_sub(&self.field_mul(&m, &m), &self.field_add(&s, &s));
        let yyyy8 = self.field_mul(&BigUint::from(8u32), &self.field_mul(&yy, &yy));
        let y3 = self.field_sub(&self.field_mul(&m, &self.field_sub(&s, &x3)), &yyyy8);
        let z3 = self.field_mul(&BigUint::from(2u32), &self.field_mul(&point.y, &point.z));
        Jacobian {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    fn jacobian_add(&self, a: &Jacobian, b: &Jacobian) -> Jacobian {
        if a.is_infinity() {
            return Jacobian {
                x: b.x.clone(),
                y: b.y.clone(),
                z: b.z.clone(),
            };
        }
        if b.is_infinity() {
            return Jacobian {
                x: a.x.clone(),
                y: a.y.clone(),
                z: a.z.clone(),
            };
        }

        let z1z1 = self.field_mul(&a.z, &a.z);
        let z2z2 = self.field_mul(&b.z, &b.z);
        let u1 = self.field_mul(&a.x, &z2z2);
        let u2 = self.field_mul(&b.x, &z1z1);
        let s1 = self.field_mul(&a.y, &self.field_mul(&b.z, &z2z2));
        let s2 = self.field_mul(&b.y, &self.field_mul(&a.z, &z1z1));

        if u1 == u2 {
            if s1 != s2 {
                return Jacobian::infinity();
            }
            return self.jacobian_double(a);
        }

        let h = self.field_sub(&u2, &u1);
        let r = self.field_sub(&s2, &s1);
        let hh = self.field_mul(&h, &h);
        let hhh = self.field_mul(&h, &hh);
        let u1hh = self.field_mul(&u1, &hh);

        let x3 = self.field_sub(
            &self.field_sub(&self.field_mul(&r, &r), &hhh),
            &self.field_add(&u1hh, &u1hh),
        );
        let y3 = self.field_sub(
            &self.field_mul(&r, &self.field_sub(&u1hh, &x3)),
            &self.field_mul(&s1, &hhh),
        );
        let z3 = self.field_mul(&h, &self.field_mul(&a.z, &b.z));
        Jacobian {
            x: x3,
            y: y3,
            z: z3,
        }
    }
}
