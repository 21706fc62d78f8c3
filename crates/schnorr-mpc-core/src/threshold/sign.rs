//! Threshold signing
//!
//! Exactly t holders share a one-time nonce with a second VSS round, giving
//! R = Σ B_j0 and nonce shares k_i. Each sends σ_i = k_i + e·x_i; the
//! signature is s = Σ L_i(0)·σ_i over the signing set.

use super::dkg::KeyShare;
use super::messages::PartialSignatureMessage;
use super::polynomial::{evaluate_commitments, lagrange_coefficient_at_zero};
use super::vss::{self, VssRound};
use super::Phase;
use crate::arith::{int_from_bytes, int_to_bytes, Curve, Point, Scalar};
use crate::mpc::Relay;
use crate::schnorr;
use crate::types::{message_from_slice, MESSAGE_LEN};
use crate::{Error, PartyId, Result, SessionId, Signature, ThresholdConfig, Value};
use rand_core::CryptoRngCore;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// One collaborator's state in a signing ceremony
pub struct SigningSession {
    key_share: KeyShare,
    vss: VssRound,
    message: Option<[u8; MESSAGE_LEN]>,
    partial_signatures: BTreeMap<PartyId, Scalar>,
    signature: Option<Signature>,
}

impl SigningSession {
    /// Join the signing set `collaborators`, which must hold exactly t
    /// distinct holders including ourselves.
    pub fn new(
        curve: Curve,
        config: &ThresholdConfig,
        key_share: KeyShare,
        collaborators: &[PartyId],
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        if key_share.holders() != config.holders || key_share.threshold() != config.threshold {
            return Err(Error::InvalidConfig(
                "Key share does not match configuration".into(),
            ));
        }
        let mut signers = collaborators.to_vec();
        signers.sort_unstable();
        signers.dedup();
        if signers.len() != collaborators.len() {
            return Err(Error::InvalidConfig("Duplicate collaborator".into()));
        }
        for &party in &signers {
            config.check_holder(party)?;
        }
        if signers.len() < config.threshold {
            return Err(Error::ThresholdNotMet {
                required: config.threshold,
                actual: signers.len(),
            });
        }
        if signers.len() > config.threshold {
            return Err(Error::InvalidConfig(format!(
                "Exactly {} collaborators sign, got {}",
                config.threshold,
                signers.len()
            )));
        }

        let vss = VssRound::new(
            curve,
            config.blinding_generator.clone(),
            key_share.index(),
            &signers,
            config.threshold,
            rng,
        )?;

        debug!(
            party_id = key_share.index(),
            collaborators = ?signers,
            "Signing session created"
        );

        Ok(Self {
            key_share,
            vss,
            message: None,
            partial_signatures: BTreeMap::new(),
            signature: None,
        })
    }

    pub fn index(&self) -> PartyId {
        self.key_share.index()
    }

    pub fn curve(&self) -> &Curve {
        self.vss.curve()
    }

    /// Sorted signing set
    pub fn collaborators(&self) -> &[PartyId] {
        self.vss.members()
    }

    pub fn key_share(&self) -> &KeyShare {
        &self.key_share
    }

    pub fn phase(&self) -> Phase {
        if let Some(party) = self.vss.aborted_by() {
            return Phase::Aborted { party };
        }
        if self.signature.is_some() {
            return Phase::SignatureProduced;
        }
        if self.partial_signatures.len() == self.collaborators().len() {
            return Phase::Ready;
        }
        self.vss.phase()
    }

    /// Set the 32-byte message. May happen any time before partial signing.
    pub fn set_message(&mut self, message: &[u8]) -> Result<()> {
        self.vss.ensure_active()?;
        let message = message_from_slice(message)?;
        if self.message.is_some() {
            return Err(Error::AlreadyReceived {
                party: self.index(),
                value: Value::Message,
            });
        }
        self.message = Some(message);
        Ok(())
    }

    pub fn nonce_commitments(&self) -> &[Point] {
        self.vss.commitments()
    }

    pub fn set_nonce_commitments(&mut self, party: PartyId, commitments: Vec<Point>) -> Result<()> {
        self.vss.set_commitments(party, commitments)
    }

    pub fn nonce_share_for(&self, party: PartyId) -> Result<(Scalar, Scalar)> {
        self.vss.share_for(party)
    }

    pub fn relayed_nonce_commitments(
        &self,
        party: PartyId,
    ) -> Result<BTreeMap<PartyId, Vec<Point>>> {
        self.vss.relayed_commitments(party)
    }

    pub fn set_nonce_share(
        &mut self,
        party: PartyId,
        share: Scalar,
        blinding_share: Scalar,
        relayed: &BTreeMap<PartyId, Vec<Point>>,
    ) -> Result<()> {
        self.vss.set_share(party, share, blinding_share, relayed)
    }

    pub fn nonce_points(&self) -> &[Point] {
        self.vss.points()
    }

    pub fn set_nonce_points(&mut self, party: PartyId, points: Vec<Point>) -> Result<()> {
        self.vss.set_points(party, points)
    }

    /// R = Σ_j B_j0
    pub fn nonce_point(&self) -> Result<Point> {
        let joint = self.vss.joint_points()?;
        match joint.into_iter().next() {
            Some(Point::Infinity) | None => Err(Error::DegeneratePoint("nonce")),
            Some(point) => Ok(point),
        }
    }

    /// e = int(hash(bytes(x(R)) || bytes(P) || m)) mod n
    pub fn challenge(&self) -> Result<Scalar> {
        let message = self.message.as_ref().ok_or(Error::Missing {
            party: self.index(),
            value: Value::Message,
        })?;
        let nonce = self.nonce_point()?;
        let rx = nonce.x().ok_or(Error::DegeneratePoint("nonce"))?;
        schnorr::challenge(
            self.curve(),
            &int_to_bytes(rx),
            self.key_share.public_key(),
            message,
        )
    }

    /// σ_i = k_i + e·x_i, with k_i negated when y(R) is not a quadratic residue.
    pub fn partial_signature(&mut self) -> Result<Scalar> {
        let e = self.challenge()?;
        let curve = self.vss.curve();
        let nonce_share = self.vss.secret_share()?;
        let k = if self.nonce_is_normalized()? {
            nonce_share
        } else {
            curve.scalar_neg(&nonce_share)
        };
        let partial = curve.scalar_add(&k, &curve.scalar_mul(&e, self.key_share.secret_share()));
        let me = self.index();
        self.partial_signatures.insert(me, partial.clone());
        Ok(partial)
    }

    /// Store σ_j after checking σ_j·G = ±Σ_l j^l·B̄_l + e·Y_j.
    pub fn set_partial_signature(&mut self, party: PartyId, partial: Scalar) -> Result<()> {
        self.vss.ensure_active()?;
        if party == self.index() || !self.collaborators().contains(&party) {
            return Err(Error::InvalidPartyId(party));
        }
        if self.partial_signatures.contains_key(&party) {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::PartialSignature,
            });
        }
        if &partial >= self.curve().n() {
            return Err(Error::ScalarOutOfRange { party });
        }

        let e = self.challenge()?;
        let curve = self.vss.curve();
        let joint_nonce = self.vss.joint_points()?;
        let mut nonce_part = evaluate_commitments(curve, &joint_nonce, party);
        if !self.nonce_is_normalized()? {
            nonce_part = curve.point_neg(&nonce_part);
        }
        let key_part = curve.point_mul(&e, self.key_share.verification_point(party)?);
        let expected = curve.point_add(&nonce_part, &key_part);

        if curve.mul_base(&partial) != expected {
            return Err(self.vss.abort(Error::InvalidPartialSignature { party }));
        }
        self.partial_signatures.insert(party, partial);
        Ok(())
    }

    /// s = Σ L_i(0)·σ_i, verified against the shared key before it is returned.
    pub fn combine(&mut self) -> Result<Signature> {
        self.vss.ensure_active()?;
        if let Some(signature) = self.signature {
            return Ok(signature);
        }
        if !self.partial_signatures.contains_key(&self.index()) {
            self.partial_signature()?;
        }

        let signers = self.collaborators().to_vec();
        let curve = self.vss.curve();
        let mut s = Scalar::default();
        for &party in &signers {
            let partial = self.partial_signatures.get(&party).ok_or(Error::Missing {
                party,
                value: Value::PartialSignature,
            })?;
            let weight = lagrange_coefficient_at_zero(curve, party, &signers)?;
            s = curve.scalar_add(&s, &curve.scalar_mul(&weight, partial));
        }

        let nonce = self.nonce_point()?;
        let rx = nonce.x().ok_or(Error::DegeneratePoint("nonce"))?;
        let signature = Signature::new(int_to_bytes(rx), int_to_bytes(&s));
        let message = self.message.as_ref().ok_or(Error::Missing {
            party: self.index(),
            value: Value::Message,
        })?;
        schnorr::verify(
            curve,
            self.key_share.public_key(),
            message,
            &signature.to_bytes(),
        )?;

        self.signature = Some(signature);
        info!(
            party_id = self.index(),
            signature = %hex::encode(signature.to_bytes()),
            "Threshold signature produced"
        );
        Ok(signature)
    }

    pub(crate) fn vss_mut(&mut self) -> &mut VssRound {
        &mut self.vss
    }

    fn nonce_is_normalized(&self) -> Result<bool> {
        let nonce = self.nonce_point()?;
        let ry = nonce.y().ok_or(Error::DegeneratePoint("nonce"))?;
        Ok(self.curve().is_quadratic_residue(ry))
    }
}

/// Run threshold signing for one collaborator over the relay.
///
/// Rounds 1-3 share the nonce, round 4 carries the partial signatures.
#[instrument(skip(session, relay), fields(party_id = session.index()))]
pub async fn run_signing<R: Relay>(
    mut session: SigningSession,
    message: &[u8],
    session_id: &SessionId,
    relay: &R,
) -> Result<Signature> {
    let me = session.index();
    let signers = session.collaborators().len();
    info!(collaborators = ?session.collaborators(), "Starting threshold signing");

    vss::exchange(session.vss_mut(), session_id, 1, relay).await?;
    session.set_message(message)?;

    debug!("Round 4: partial signatures");
    let partial = session.partial_signature()?;
    relay
        .broadcast(
            session_id,
            4,
            &PartialSignatureMessage {
                party_id: me,
                partial_signature: int_to_bytes(&partial),
            },
        )
        .await?;
    let messages = relay
        .collect_broadcasts::<PartialSignatureMessage>(session_id, 4, signers)
        .await?;
    for msg in messages.into_iter().filter(|m| m.party_id != me) {
        session.set_partial_signature(msg.party_id, int_from_bytes(&msg.partial_signature))?;
    }

    let signature = session.combine()?;
    info!("Threshold signing complete");
    Ok(signature)
}
