use certmint::authority::AuthorityManager;
use certmint::cert::params::DistinguishedName;
use certmint::config::EngineConfig;
use certmint::profile::Usage;
use certmint::store::{MemoryCertificateStore, StoreScope};

fn main() -> anyhow::Result<()> {
    let authority = DistinguishedName::parse("CN=Demo CA, O=Example, C=US")?;
    let mut manager = AuthorityManager::new(
        MemoryCertificateStore::new(),
        Some(authority.clone()),
        EngineConfig::default(),
    );

    // The root is created on first use.
    let root = manager.get_or_create_authority(&authority)?;
    println!("Root certificate PEM:\n{}", root.cert.to_pem()?);

    for (name, usage) in [
        ("CN=myserver.local, O=Example", Usage::Server),
        ("CN=alice, O=Example", Usage::Client),
        ("CN=release signing, O=Example", Usage::Code),
    ] {
        let cert = manager.generate_certificate(name, usage, 0)?;
        println!(
            "{usage} certificate for {} (issuer {}):\n{}",
            cert.subject()?,
            cert.issuer()?,
            cert.to_pem()?
        );
    }

    // Asking again returns the stored record.
    let again = manager.generate_certificate("CN=alice, O=Example", Usage::Client, 0)?;
    println!("alice again, serial unchanged: {:02x?}", again.serial_number());

    let store = manager.into_store();
    println!(
        "store holds {} root(s) and {} leaf certificate(s) after {} writes",
        store.len(StoreScope::Root),
        store.len(StoreScope::My),
        store.put_count()
    );
    Ok(())
}
