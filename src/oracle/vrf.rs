use crate::types::{Address, RandomWord, RequestId};
use schnorrkel::{context::SigningContext, Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"lucky-raffle-vrf";

/// One random word with the signature it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfProof {
    pub word: RandomWord,
    /// schnorrkel signature, hex
    pub proof: String,
    /// signer public key, hex
    pub public_key: String,
    pub input_message: String,
}

/// Signature-based random word generator
///
/// Each word is the SHA-256 of a schnorrkel signature over a message that
/// names the request, the consumer and the word position, so the words are
/// unpredictable without the key yet checkable by anyone holding the
/// public key.
#[derive(Clone)]
pub struct VrfEngine {
    keypair: Arc<Keypair>,
}

impl VrfEngine {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn new_random() -> Self {
        use rand_core::OsRng;
        Self::new(Keypair::generate_with(OsRng))
    }

    /// Deterministic key for reproducible simulations
    pub fn from_seed(seed: u64) -> Self {
        use rand::{rngs::StdRng, SeedableRng};
        let rng = StdRng::seed_from_u64(seed);
        Self::new(Keypair::generate_with(rng))
    }

    pub fn input_message(request_id: RequestId, consumer: &Address, index: u32) -> String {
        format!("{}:{}:{}", request_id, consumer, index)
    }

    pub fn generate(&self, request_id: RequestId, consumer: &Address, num_words: u32) -> Vec<VrfProof> {
        (0..num_words)
            .map(|index| self.prove(Self::input_message(request_id, consumer, index)))
            .collect()
    }

    fn prove(&self, input_message: String) -> VrfProof {
        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let signature = self.keypair.sign(ctx.bytes(input_message.as_bytes()));
        let signature_bytes = signature.to_bytes();

        VrfProof {
            word: RandomWord::from_bytes(Sha256::digest(signature_bytes).into()),
            proof: hex::encode(signature_bytes),
            public_key: self.public_key_hex(),
            input_message,
        }
    }

    /// Check the signature against the embedded public key and that the word
    /// is derived from it
    pub fn verify(proof: &VrfProof) -> Result<bool, String> {
        let public_key_bytes =
            hex::decode(&proof.public_key).map_err(|e| format!("Invalid public key hex: {}", e))?;
        let public_key = PublicKey::from_bytes(&public_key_bytes)
            .map_err(|e| format!("Invalid public key: {:?}", e))?;

        let signature_bytes =
            hex::decode(&proof.proof).map_err(|e| format!("Invalid proof hex: {}", e))?;
        let signature = Signature::from_bytes(&signature_bytes)
            .map_err(|e| format!("Invalid signature: {:?}", e))?;

        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        if public_key
            .verify(ctx.bytes(proof.input_message.as_bytes()), &signature)
            .is_err()
        {
            return Ok(false);
        }

        let expected: [u8; 32] = Sha256::digest(&signature_bytes).into();
        Ok(proof.word.as_bytes() == &expected)
    }

    /// Check a delivered fulfillment and return its words in order.
    ///
    /// Every proof must carry `oracle_key`, be signed over the input message
    /// for `request_id`, `consumer` and its own position, and hash to its word.
    pub fn verify_fulfillment(
        oracle_key: &str,
        request_id: RequestId,
        consumer: &Address,
        proofs: &[VrfProof],
    ) -> Result<Vec<RandomWord>, String> {
        proofs
            .iter()
            .enumerate()
            .map(|(index, proof)| {
                if proof.public_key != oracle_key {
                    return Err(format!("proof {} is not signed by the oracle key", index));
                }
                let expected = Self::input_message(request_id, consumer, index as u32);
                if proof.input_message != expected {
                    return Err(format!("proof {} was issued for '{}'", index, proof.input_message));
                }
                match Self::verify(proof)? {
                    true => Ok(proof.word),
                    false => Err(format!("proof {} does not verify", index)),
                }
            })
            .collect()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }
}
