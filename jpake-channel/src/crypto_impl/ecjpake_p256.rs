use p256::elliptic_curve::ff::PrimeField;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{AffinePoint, EncodedPoint, FieldBytes, NonZeroScalar, ProjectivePoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{EcJpake, JpakeRole, RoundBuffer, JPAKE_SHARED_SECRET_SIZE};

/// Size of an uncompressed SEC1 P-256 point.
const POINT_SIZE: usize = 65;
/// Size of a P-256 scalar or field element.
const SCALAR_SIZE: usize = 32;

const ID_CLIENT: &[u8] = b"client";
const ID_SERVER: &[u8] = b"server";

/// TLS ECParameters for secp256r1: curve type `named_curve` (3) followed by NamedCurve 23.
const ECPARAMS_SECP256R1: [u8; 3] = [3, 0, 23];

struct LocalKeys {
    x1: Scalar,
    x2: Scalar,
    pub1: ProjectivePoint,
    pub2: ProjectivePoint,
}

/// EC-JPAKE over P-256 implemented with the p256 crate.
///
/// The wire format is byte compatible with mbedTLS' `mbedtls_ecjpake_*` functions, which is what
/// embedded peers run.
pub struct CrateEcJpakeP256 {
    role: JpakeRole,
    password: Scalar,
    mine: Option<LocalKeys>,
    peer: Option<(ProjectivePoint, ProjectivePoint)>,
    peer_round_two: Option<ProjectivePoint>,
}

impl CrateEcJpakeP256 {
    fn id_mine(&self) -> &'static [u8] {
        match self.role {
            JpakeRole::Client => ID_CLIENT,
            JpakeRole::Server => ID_SERVER,
        }
    }
    fn id_peer(&self) -> &'static [u8] {
        match self.role {
            JpakeRole::Client => ID_SERVER,
            JpakeRole::Server => ID_CLIENT,
        }
    }
}

/// Interpret `bytes` as a big-endian integer and reduce it modulo the group order.
fn reduce_be_bytes(bytes: &[u8]) -> Scalar {
    let radix = Scalar::from(256u64);
    bytes
        .iter()
        .fold(Scalar::ZERO, |acc, b| acc * radix + Scalar::from(*b as u64))
}

fn encode_point(p: &ProjectivePoint) -> EncodedPoint {
    AffinePoint::from(*p).to_encoded_point(false)
}

/// Write `p` as a TLS ECPoint: one length byte followed by the uncompressed point.
fn write_point(out: &mut RoundBuffer, p: &ProjectivePoint) {
    let encoded = encode_point(p);
    out.push(encoded.len() as u8);
    out.extend(encoded.as_bytes().iter().copied());
}

fn read_point(data: &[u8], i: &mut usize) -> Option<ProjectivePoint> {
    let len = *data.get(*i)? as usize;
    if len != POINT_SIZE {
        return None;
    }
    let raw = data.get(*i + 1..*i + 1 + len)?;
    *i += 1 + len;
    let encoded = EncodedPoint::from_bytes(raw).ok()?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))?;
    let point = ProjectivePoint::from(affine);
    if point == ProjectivePoint::IDENTITY {
        None
    } else {
        Some(point)
    }
}

/// Write `r` as one length byte followed by its minimal big-endian encoding.
fn write_scalar(out: &mut RoundBuffer, r: &Scalar) {
    let repr = r.to_repr();
    let start = repr.iter().position(|b| *b != 0).unwrap_or(SCALAR_SIZE);
    out.push((SCALAR_SIZE - start) as u8);
    out.extend(repr[start..].iter().copied());
}

fn read_scalar(data: &[u8], i: &mut usize) -> Option<Scalar> {
    let len = *data.get(*i)? as usize;
    if len > SCALAR_SIZE {
        return None;
    }
    let raw = data.get(*i + 1..*i + 1 + len)?;
    *i += 1 + len;
    let mut repr = FieldBytes::default();
    repr[SCALAR_SIZE - len..].copy_from_slice(raw);
    Option::from(Scalar::from_repr(repr))
}

/// The Schnorr challenge `H(G || V || X || id) mod n`, where every point is prefixed with its
/// 4 byte big-endian length and the identity likewise.
fn zkp_hash(generator: &ProjectivePoint, v: &ProjectivePoint, x: &ProjectivePoint, id: &[u8]) -> Scalar {
    let mut hash = Sha256::new();
    for p in [generator, v, x] {
        let encoded = encode_point(p);
        hash.update((encoded.len() as u32).to_be_bytes());
        hash.update(encoded.as_bytes());
    }
    hash.update((id.len() as u32).to_be_bytes());
    hash.update(id);
    reduce_be_bytes(&hash.finalize())
}

fn zkp_write<Rng: RngCore + CryptoRng>(
    rng: &mut Rng,
    out: &mut RoundBuffer,
    generator: &ProjectivePoint,
    x: &Scalar,
    pub_x: &ProjectivePoint,
    id: &[u8],
) {
    let mut v = *NonZeroScalar::random(rng);
    let pub_v = *generator * v;
    let h = zkp_hash(generator, &pub_v, pub_x, id);
    let r = v - *x * h;
    v.zeroize();
    write_point(out, &pub_v);
    write_scalar(out, &r);
}

#[must_use]
fn zkp_read(data: &[u8], i: &mut usize, generator: &ProjectivePoint, pub_x: &ProjectivePoint, id: &[u8]) -> bool {
    let (pub_v, r) = match (read_point(data, i), read_scalar(data, i)) {
        (Some(pub_v), Some(r)) => (pub_v, r),
        _ => return false,
    };
    let h = zkp_hash(generator, &pub_v, pub_x, id);
    *generator * r + *pub_x * h == pub_v
}

/// Generate a key pair on `generator` and write its public half with a proof of knowledge.
fn kkp_write<Rng: RngCore + CryptoRng>(
    rng: &mut Rng,
    out: &mut RoundBuffer,
    generator: &ProjectivePoint,
    id: &[u8],
) -> (Scalar, ProjectivePoint) {
    let x = *NonZeroScalar::random(&mut *rng);
    let pub_x = *generator * x;
    write_point(out, &pub_x);
    zkp_write(rng, out, generator, &x, &pub_x, id);
    (x, pub_x)
}

fn kkp_read(data: &[u8], i: &mut usize, generator: &ProjectivePoint, id: &[u8]) -> Option<ProjectivePoint> {
    let pub_x = read_point(data, i)?;
    zkp_read(data, i, generator, &pub_x, id).then_some(pub_x)
}

impl<Rng: RngCore + CryptoRng> EcJpake<Rng> for CrateEcJpakeP256 {
    fn new(role: JpakeRole, password: &[u8]) -> Option<Self> {
        let password = reduce_be_bytes(password);
        if password == Scalar::ZERO {
            return None;
        }
        Some(Self { role, password, mine: None, peer: None, peer_round_two: None })
    }

    fn write_round_one(&mut self, rng: &mut Rng, out: &mut RoundBuffer) {
        let generator = ProjectivePoint::GENERATOR;
        let id = self.id_mine();
        let (x1, pub1) = kkp_write(rng, out, &generator, id);
        let (x2, pub2) = kkp_write(rng, out, &generator, id);
        self.mine = Some(LocalKeys { x1, x2, pub1, pub2 });
    }

    fn read_round_one(&mut self, data: &[u8]) -> bool {
        let generator = ProjectivePoint::GENERATOR;
        let id = self.id_peer();
        let mut i = 0;
        let Some(peer1) = kkp_read(data, &mut i, &generator, id) else {
            return false;
        };
        let Some(peer2) = kkp_read(data, &mut i, &generator, id) else {
            return false;
        };
        if i != data.len() {
            return false;
        }
        self.peer = Some((peer1, peer2));
        true
    }

    fn write_round_two(&mut self, rng: &mut Rng, out: &mut RoundBuffer) -> bool {
        let (Some(mine), Some((peer1, peer2))) = (self.mine.as_ref(), self.peer.as_ref()) else {
            return false;
        };
        let generator = *peer1 + *peer2 + mine.pub1;
        let mut xm = mine.x2 * self.password;
        let pub_xm = generator * xm;
        if self.role == JpakeRole::Server {
            out.extend(ECPARAMS_SECP256R1);
        }
        write_point(out, &pub_xm);
        zkp_write(rng, out, &generator, &xm, &pub_xm, self.id_mine());
        xm.zeroize();
        true
    }

    fn read_round_two(&mut self, data: &[u8]) -> bool {
        let (Some(mine), Some((peer1, _))) = (self.mine.as_ref(), self.peer.as_ref()) else {
            return false;
        };
        let generator = mine.pub1 + mine.pub2 + *peer1;
        let mut i = 0;
        if self.role == JpakeRole::Client {
            if data.get(..ECPARAMS_SECP256R1.len()) != Some(&ECPARAMS_SECP256R1[..]) {
                return false;
            }
            i = ECPARAMS_SECP256R1.len();
        }
        let Some(peer_xm) = kkp_read(data, &mut i, &generator, self.id_peer()) else {
            return false;
        };
        if i != data.len() {
            return false;
        }
        self.peer_round_two = Some(peer_xm);
        true
    }

    fn derive_secret(&self) -> Option<Zeroizing<[u8; JPAKE_SHARED_SECRET_SIZE]>> {
        let mine = self.mine.as_ref()?;
        let (_, peer2) = self.peer.as_ref()?;
        let peer_xm = self.peer_round_two.as_ref()?;
        // K = (Xp - Xp2 * x2 * s) * x2
        let k = (*peer_xm - *peer2 * (mine.x2 * self.password)) * mine.x2;
        let encoded = encode_point(&k);
        let kx = encoded.x()?;
        let mut ret = Zeroizing::new([0u8; JPAKE_SHARED_SECRET_SIZE]);
        ret.copy_from_slice(&Sha256::digest(kx));
        Some(ret)
    }
}

impl CrateEcJpakeP256 {
    fn erase(&mut self) {
        self.password.zeroize();
        if let Some(mine) = self.mine.as_mut() {
            mine.x1.zeroize();
            mine.x2.zeroize();
        }
    }
}

impl Drop for CrateEcJpakeP256 {
    fn drop(&mut self) {
        self.erase();
    }
}
