//! # CRD Generator
//!
//! Prints the `BackupBucket` CustomResourceDefinition as YAML.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/backupbucket.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use backup_bucket_controller::crd::BackupBucket;
use kube::core::CustomResourceExt;

fn main() {
    let crd = BackupBucket::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            println!("# This file is auto-generated by crdgen");
            println!("# DO NOT EDIT THIS FILE MANUALLY");
            println!("# Change the types in src/crd/ and regenerate instead");
            println!("#");
            println!("---");
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
