//! Account derivation from a BIP-39 mnemonic for development wallets

use anyhow::{Context, Result};
use bip32::{DerivationPath, XPrv};
use bip39::Mnemonic;
use secp256k1::{PublicKey, Secp256k1};

use crate::address::Address;

/// Derive the account at `m/44'/60'/0'/0/<index>`
///
/// This is the standard Ethereum path, so the addresses match what a
/// development chain seeded with the same mnemonic reports.
pub fn derive_account(mnemonic: &str, index: u32) -> Result<Address> {
    let mnemonic = Mnemonic::parse_in_normalized(bip39::Language::English, mnemonic)
        .context("Failed to parse mnemonic")?;
    let seed = mnemonic.to_seed("");
    let seed_bytes: &[u8] = seed.as_ref();

    let derivation_path: DerivationPath = format!("m/44'/60'/0'/0/{}", index)
        .parse()
        .context("Failed to parse derivation path")?;
    let child_key = XPrv::derive_from_path(seed_bytes, &derivation_path)
        .context("Failed to derive private key")?;

    // k256 signing key -> secp256k1 secret key
    let bytes: [u8; 32] = child_key.private_key().to_bytes().into();
    let secret_key = secp256k1::SecretKey::from_byte_array(bytes)
        .context("Failed to create secp256k1 secret key")?;

    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);

    Address::from_public_key(&public_key.serialize_uncompressed())
        .context("Failed to derive address from public key")
}

/// Derive the first `count` accounts of a mnemonic
pub fn derive_accounts(mnemonic: &str, count: u32) -> Result<Vec<Address>> {
    (0..count)
        .map(|index| derive_account(mnemonic, index))
        .collect()
}
