// Rebuild when a migration is added or edited, since they are embedded
fn main() {
    println!("cargo:rerun-if-changed=../migrations");
}
