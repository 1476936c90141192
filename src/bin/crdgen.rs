//! Print the `Probe` CustomResourceDefinition as YAML

use kube::CustomResourceExt;
use readiness_gate::crd::Probe;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&Probe::crd())?);
    Ok(())
}
