//! Block primitives the miner assembles and hashes
//!
//! Layouts follow the network's fixed serialization: an 80-byte header
//! (version, previous hash, merkle root, time, bits, nonce, integers
//! little-endian) and legacy transaction encoding with CompactSize counts.

use crypto_hashes::{double_sha256, merkle_root, Hash};
use serde::{Deserialize, Serialize};

/// Size of a serialized block header in bytes
pub const HEADER_SIZE: usize = 80;

/// Offset of the nonce inside a serialized header
pub const NONCE_OFFSET: usize = 76;

/// Weight units charged per serialized byte
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Reference to an output of a previous transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub vout: u32,
}

impl OutPoint {
    /// The outpoint spent by a coinbase input
    pub const fn null() -> Self {
        Self {
            txid: Hash::zeroed(),
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.vout == u32::MAX && self.txid.is_zero()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// A coinbase spends exactly one null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&self.version.to_le_bytes());

        write_compact_size(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(input.previous_output.txid.as_bytes());
            out.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_compact_size(&mut out, input.script_sig.len() as u64);
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut out, output.script_pubkey.len() as u64);
            out.extend_from_slice(&output.script_pubkey);
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Transaction id: double-SHA256 of the serialization
    pub fn txid(&self) -> Hash {
        Hash::from(double_sha256(&self.serialize()))
    }

    pub fn weight(&self) -> u64 {
        self.serialize().len() as u64 * WITNESS_SCALE_FACTOR
    }
}

/// Writes a Bitcoin CompactSize integer
pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[NONCE_OFFSET..HEADER_SIZE].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Block hash: double-SHA256 of the serialized header
    pub fn hash(&self) -> Hash {
        Hash::from(double_sha256(&self.serialize()))
    }
}

/// A solved block ready for submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Height the block extends the chain to
    pub height: u64,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }
}

/// A candidate block under construction.
///
/// The transaction list is private so every change goes through a method
/// that recomputes the merkle root; the header handed out is always
/// consistent with the transactions.
#[derive(Clone, Debug)]
pub struct BlockTemplate {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    height: u64,
    total_fees: u64,
}

impl BlockTemplate {
    pub fn new(
        version: i32,
        prev_block_hash: Hash,
        timestamp: u32,
        bits: u32,
        height: u64,
        coinbase: Transaction,
    ) -> Self {
        let mut template = Self {
            header: BlockHeader {
                version,
                prev_block_hash,
                merkle_root: Hash::zeroed(),
                timestamp,
                bits,
                nonce: 0,
            },
            transactions: vec![coinbase],
            height,
            total_fees: 0,
        };
        template.recompute_merkle_root();
        template
    }

    /// Appends a transaction after the coinbase
    pub fn push_transaction(&mut self, tx: Transaction, fee: u64) {
        self.transactions.push(tx);
        self.total_fees = self.total_fees.saturating_add(fee);
        self.recompute_merkle_root();
    }

    /// Replaces the coinbase, e.g. after adjusting its reward
    pub fn set_coinbase(&mut self, coinbase: Transaction) {
        self.transactions[0] = coinbase;
        self.recompute_merkle_root();
    }

    fn recompute_merkle_root(&mut self) {
        let txids: Vec<Hash> = self.transactions.iter().map(Transaction::txid).collect();
        self.header.merkle_root = merkle_root(&txids);
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.header.nonce = nonce;
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.transactions[0]
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn bits(&self) -> u32 {
        self.header.bits
    }

    pub fn total_fees(&self) -> u64 {
        self.total_fees
    }

    /// Total weight of header plus transactions
    pub fn weight(&self) -> u64 {
        let mut count = Vec::with_capacity(9);
        write_compact_size(&mut count, self.transactions.len() as u64);
        let tx_weight: u64 = self.transactions.iter().map(Transaction::weight).sum();
        (HEADER_SIZE as u64 + count.len() as u64) * WITNESS_SCALE_FACTOR + tx_weight
    }

    /// Consumes the template, producing a block with the given nonce
    pub fn into_block(mut self, nonce: u32) -> Block {
        self.header.nonce = nonce;
        Block {
            header: self.header,
            transactions: self.transactions,
            height: self.height,
        }
    }
}
