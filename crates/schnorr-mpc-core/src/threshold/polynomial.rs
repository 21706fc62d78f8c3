//! Polynomials over the scalar field, commitment evaluation and Lagrange
//! coefficients

use crate::arith::{Curve, Point, Scalar};
use crate::{Error, PartyId, Result};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;

/// f(x) = a_0 + a_1·x + ... + a_(t-1)·x^(t-1) mod n
#[derive(Clone)]
pub struct Polynomial {
    coefficients: Vec<Scalar>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<Scalar>) -> Self {
        Self { coefficients }
    }

    /// Random polynomial with `threshold` coefficients, i.e. degree t-1.
    pub fn random(curve: &Curve, threshold: usize, rng: &mut impl CryptoRngCore) -> Self {
        Self {
            coefficients: (0..threshold).map(|_| curve.random_scalar(rng)).collect(),
        }
    }

    pub fn coefficients(&self) -> &[Scalar] {
        &self.coefficients
    }

    /// f(0)
    pub fn constant(&self) -> Scalar {
        self.coefficients.first().cloned().unwrap_or_default()
    }

    /// f(x) by Horner's rule
    pub fn evaluate(&self, curve: &Curve, x: PartyId) -> Scalar {
        let x = BigUint::from(x);
        self.coefficients.iter().rev().fold(Scalar::zero(), |acc, a| {
            curve.scalar_add(&curve.scalar_mul(&acc, &x), a)
        })
    }

    /// a_l·G for every coefficient
    pub fn points(&self, curve: &Curve) -> Vec<Point> {
        self.coefficients.iter().map(|a| curve.mul_base(a)).collect()
    }
}

/// Σ x^l·C_l, evaluated by Horner's rule so each step multiplies by the small x.
pub fn evaluate_commitments(curve: &Curve, commitments: &[Point], x: PartyId) -> Point {
    let x = BigUint::from(x);
    commitments.iter().rev().fold(Point::Infinity, |acc, c| {
        curve.point_add(&curve.point_mul(&x, &acc), c)
    })
}

/// L_i(0) = Π_(j≠i) j·(j-i)^-1 mod n over the signing set.
pub fn lagrange_coefficient_at_zero(
    curve: &Curve,
    index: PartyId,
    indices: &[PartyId],
) -> Result<Scalar> {
    if !indices.contains(&index) {
        return Err(Error::InvalidPartyId(index));
    }
    let mut distinct = indices.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() != indices.len() {
        return Err(Error::InvalidConfig(
            "Signing set indices must be distinct".into(),
        ));
    }
    let i = BigUint::from(index);
    let mut coefficient = Scalar::one();
    for &j in indices.iter().filter(|&&j| j != index) {
        let j = BigUint::from(j);
        let denominator = curve
            .scalar_invert(&curve.scalar_sub(&j, &i))
            .ok_or(Error::InvalidPartyId(index))?;
        coefficient = curve.scalar_mul(&coefficient, &curve.scalar_mul(&j, &denominator));
    }
    Ok(coefficient)
}
