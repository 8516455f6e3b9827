// Shape operations — the ledger's unit of client-submitted work (spec section 3).

use crate::config::CanvasSettings;
use crate::crypto::keys::{PublicKey, SecretKey};
use crate::crypto::{hash, keys};
use crate::error::BlockArtError;
use crate::geometry::{self, path::Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ShapeKind {
    Path,
}

/// A single draw or erase instruction against the shared canvas.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Op {
    pub shape_hash: String,
    pub kind: ShapeKind,
    pub d_attribute: String,
    pub fill: String,
    pub stroke: String,
    pub is_delete: bool,
    pub ink_cost: u32,
    pub num_block_validate: u8,
    pub artist_key: PublicKey,
    pub sig: keys::Signature,
}

impl Op {
    /// The signature covers exactly the bytes of `d_attribute` (spec section 3).
    pub fn signing_bytes(&self) -> &[u8] {
        self.d_attribute.as_bytes()
    }

    pub fn verify_signature(&self) -> bool {
        keys::verify(self.signing_bytes(), &self.sig, &self.artist_key)
    }

    /// `shape_hash` is the MD5 hex of `svg_fragment` concatenated with the
    /// local timestamp at admission (spec section 3) — distinguishing
    /// otherwise-identical resubmissions of the same shape.
    fn compute_shape_hash(d_attribute: &str, admitted_at_nanos: u128) -> String {
        let mut buf = d_attribute.as_bytes().to_vec();
        buf.extend_from_slice(admitted_at_nanos.to_string().as_bytes());
        hash::md5_hex(&buf)
    }

    /// Builds, costs, and signs a new add-shape operation. Used by the
    /// art-node side of the client RPC surface (`AddShape`).
    pub fn new_add(
        d_attribute: String,
        fill: String,
        stroke: String,
        num_block_validate: u8,
        artist_key: PublicKey,
        artist_sk: &SecretKey,
        canvas: &CanvasSettings,
    ) -> Result<Self, BlockArtError> {
        let points = geometry::parse_path(&d_attribute)?;
        if !geometry::in_bounds(&points, canvas.canvas_x_max, canvas.canvas_y_max) {
            return Err(BlockArtError::OutOfBounds);
        }
        let ink_cost = geometry::ink_cost(&points, &fill, &stroke)?;
        if !geometry::is_line(&points) && geometry::self_intersects(&points) {
            return Err(BlockArtError::InvalidShape(d_attribute));
        }

        let admitted_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let shape_hash = Self::compute_shape_hash(&d_attribute, admitted_at);
        let sig = keys::sign(d_attribute.as_bytes(), artist_sk);

        Ok(Op {
            shape_hash,
            kind: ShapeKind::Path,
            d_attribute,
            fill,
            stroke,
            is_delete: false,
            ink_cost,
            num_block_validate,
            artist_key,
            sig,
        })
    }

    /// Builds a delete operation targeting a previously added shape. Ink cost
    /// is inherited from the shape it deletes (refunded on admission), not
    /// recomputed here — the caller supplies it.
    pub fn new_delete(
        target_shape_hash: String,
        d_attribute: String,
        ink_refund: u32,
        artist_key: PublicKey,
        artist_sk: &SecretKey,
    ) -> Self {
        let sig = keys::sign(d_attribute.as_bytes(), artist_sk);
        Op {
            shape_hash: target_shape_hash,
            kind: ShapeKind::Path,
            d_attribute,
            fill: "transparent".to_string(),
            stroke: "transparent".to_string(),
            is_delete: true,
            ink_cost: ink_refund,
            num_block_validate: 0,
            artist_key,
            sig,
        }
    }

    pub fn points(&self) -> Result<Vec<Point>, BlockArtError> {
        geometry::parse_path(&self.d_attribute)
    }

    /// Structural validity only (spec section 4.4 rule 2 is the network-level
    /// counterpart) — well-formed svg, in bounds, signature checks out.
    pub fn is_structurally_valid(&self, canvas: &CanvasSettings) -> bool {
        let points = match self.points() {
            Ok(p) => p,
            Err(_) => return false,
        };
        if !geometry::in_bounds(&points, canvas.canvas_x_max, canvas.canvas_y_max) {
            return false;
        }
        if !self.is_delete && geometry::ink_cost(&points, &self.fill, &self.stroke).is_err() {
            return false;
        }
        self.verify_signature()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasSettings;

    fn canvas() -> CanvasSettings {
        CanvasSettings {
            canvas_x_max: 1024,
            canvas_y_max: 1024,
        }
    }

    fn mock_add() -> Op {
        let (pk, sk) = keys::generate_keypair();
        Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "red".to_string(),
            2,
            pk,
            &sk,
            &canvas(),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_add_op() {
        let op = mock_add();
        assert!(op.is_structurally_valid(&canvas()));
        assert_eq!(op.ink_cost, 5);
    }

    #[test]
    fn test_tampered_d_attribute_rejected() {
        let mut op = mock_add();
        op.d_attribute = "M 0 0 L 4 3".to_string();
        assert!(!op.is_structurally_valid(&canvas()));
    }

    #[test]
    fn test_wrong_artist_key_rejected() {
        let mut op = mock_add();
        let (other_pk, _other_sk) = keys::generate_keypair();
        op.artist_key = other_pk;
        assert!(!op.is_structurally_valid(&canvas()));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let (pk, sk) = keys::generate_keypair();
        let small = CanvasSettings {
            canvas_x_max: 2,
            canvas_y_max: 2,
        };
        let result = Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "red".to_string(),
            1,
            pk,
            &sk,
            &small,
        );
        assert!(matches!(result, Err(BlockArtError::OutOfBounds)));
    }

    #[test]
    fn test_both_transparent_rejected_at_construction() {
        let (pk, sk) = keys::generate_keypair();
        let result = Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "transparent".to_string(),
            1,
            pk,
            &sk,
            &canvas(),
        );
        assert!(matches!(result, Err(BlockArtError::InvalidShape(_))));
    }

    #[test]
    fn test_shape_hash_changes_on_resubmission() {
        let (pk, sk) = keys::generate_keypair();
        let a = Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "red".to_string(),
            1,
            pk.clone(),
            &sk,
            &canvas(),
        )
        .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "red".to_string(),
            1,
            pk,
            &sk,
            &canvas(),
        )
        .unwrap();
        assert_ne!(a.shape_hash, b.shape_hash);
    }
}
