use std::env;

use path_verify::{store::Store, Variant, VerificationRun};

/// Usage: verify_one_as <data_dir> <asn> [variant]
fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = args.get(1).map(String::as_str).unwrap_or("data");
    let asn = args.get(2).map_or(13030, |s| s.parse().unwrap());
    let variant: Variant = args.get(3).map_or(Variant::Full, |s| s.parse().unwrap());

    let store = Store::new(data_dir);
    let graph = store.relationships("as-rel.txt").unwrap();
    let reference = store.reference_set(asn).unwrap();
    let extrapolation = store.extrapolation_set(asn, variant).unwrap();

    let summary = VerificationRun::new(asn, variant, &graph).execute(&reference, &extrapolation);

    println!(
        "AS{} ({}): {}/{} verifiable",
        summary.asn, summary.variant, summary.verifiable_prefixes, summary.total_prefixes
    );
    println!("average edit distance: {:.3}", summary.avg_distance);
    println!("success by hop: {:?}", summary.success);
    println!("failure by hop: {:?}", summary.failure);
    println!("links without a known relationship: {}", summary.missing_relationship);
}
