//! The built-in web-server stack.
//!
//! Declares the reference deployment: a resource group, a virtual network
//! with a subnet, a public IP, a network interface, and a virtual machine
//! that serves a static page via a boot-time shell script. A final
//! read-only lookup resolves the allocated public IP address once the VM
//! exists, and the address is exported as `public_ip`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;

use crate::config::StackConfig;
use crate::error::Result;
use crate::graph::{Evaluator, Output, Property, PropertyMap};
use crate::provider::{ResourceKind, fields};

/// Boot script of the deployed web server. Treated as an opaque blob; it
/// is shipped base64-encoded in the VM's custom data.
pub const WEB_SERVER_BOOT_SCRIPT: &str = "#!/bin/bash

echo \"Hello, World!\" > index.html
nohup python -m SimpleHTTPServer 80 &";

/// Builds a property map from named bindings.
fn object(entries: Vec<(&str, Property)>) -> PropertyMap {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Extracts one element of a combined output array.
fn element(combined: &Output, index: usize) -> Output {
    combined.map(move |values| {
        values.get(index).cloned().ok_or_else(|| {
            format!("combined output has no element {index}")
        })
    })
}

/// Declares the web-server stack into a fresh evaluator.
///
/// # Errors
///
/// Returns an error if any declaration is rejected (which would indicate a
/// name collision in the stack itself).
pub fn web_server_stack(config: &StackConfig) -> Result<Evaluator> {
    let mut evaluator = Evaluator::new();

    let resource_group = evaluator.declare(
        ResourceKind::ResourceGroup,
        "server",
        object(vec![("location", Property::string(&config.location))]),
    )?;

    let network = evaluator.declare(
        ResourceKind::VirtualNetwork,
        "server-network",
        object(vec![
            (
                "resource_group_name",
                Property::from(resource_group.output(fields::NAME)),
            ),
            (
                "location",
                Property::from(resource_group.output("location")),
            ),
            (
                "address_spaces",
                Property::from(json!(config.network.address_spaces)),
            ),
            (
                "subnets",
                Property::from(json!([{
                    "name": config.network.inline_subnet.name,
                    "address_prefix": config.network.inline_subnet.address_prefix,
                }])),
            ),
        ]),
    )?;

    let subnet = evaluator.declare(
        ResourceKind::Subnet,
        "server-subnet",
        object(vec![
            (
                "resource_group_name",
                Property::from(resource_group.output(fields::NAME)),
            ),
            (
                "virtual_network_name",
                Property::from(network.output(fields::NAME)),
            ),
            (
                "address_prefixes",
                Property::from(json!(config.network.subnet_prefixes)),
            ),
            (
                "enforce_private_link_endpoint_network_policies",
                Property::from(json!(false)),
            ),
        ]),
    )?;

    let public_ip = evaluator.declare(
        ResourceKind::PublicIp,
        "server-ip",
        object(vec![
            (
                "resource_group_name",
                Property::from(resource_group.output(fields::NAME)),
            ),
            (
                "location",
                Property::from(resource_group.output("location")),
            ),
            ("allocation_method", Property::string("Dynamic")),
        ]),
    )?;

    let network_interface = evaluator.declare(
        ResourceKind::NetworkInterface,
        "server-nic",
        object(vec![
            (
                "resource_group_name",
                Property::from(resource_group.output(fields::NAME)),
            ),
            (
                "location",
                Property::from(resource_group.output("location")),
            ),
            (
                "ip_configurations",
                Property::List(vec![Property::Object(object(vec![
                    ("name", Property::string("webserveripcfg")),
                    ("subnet_id", Property::from(subnet.output(fields::ID))),
                    (
                        "private_ip_address_allocation",
                        Property::string("Dynamic"),
                    ),
                    (
                        "public_ip_address_id",
                        Property::from(public_ip.output(fields::ID)),
                    ),
                ]))]),
            ),
        ]),
    )?;

    let boot_script = config
        .vm
        .boot_script
        .as_deref()
        .unwrap_or(WEB_SERVER_BOOT_SCRIPT);

    let vm = evaluator.declare(
        ResourceKind::VirtualMachine,
        "server-vm",
        object(vec![
            (
                "resource_group_name",
                Property::from(resource_group.output(fields::NAME)),
            ),
            (
                "location",
                Property::from(resource_group.output("location")),
            ),
            (
                "network_interface_ids",
                Property::List(vec![Property::from(
                    network_interface.output(fields::ID),
                )]),
            ),
            ("vm_size", Property::string(&config.vm.size)),
            ("delete_data_disks_on_termination", Property::from(json!(true))),
            ("delete_os_disk_on_termination", Property::from(json!(true))),
            (
                "os_profile",
                Property::Object(object(vec![
                    ("computer_name", Property::string(&config.vm.computer_name)),
                    ("admin_username", Property::string(&config.admin.username)),
                    (
                        "admin_password",
                        Property::string(config.admin.password.expose()),
                    ),
                    ("custom_data", Property::string(BASE64.encode(boot_script))),
                ])),
            ),
            (
                "os_profile_linux_config",
                Property::from(json!({ "disable_password_authentication": false })),
            ),
            (
                "storage_os_disk",
                Property::from(json!({
                    "create_option": "FromImage",
                    "name": "server-osdisk",
                })),
            ),
            (
                "storage_image_reference",
                Property::from(json!({
                    "publisher": config.vm.image.publisher,
                    "offer": config.vm.image.offer,
                    "sku": config.vm.image.sku,
                    "version": config.vm.image.version,
                })),
            ),
        ]),
    )?;

    // The allocated address is read back by name once the VM exists, so
    // the lookup is keyed on the combined trio of VM id, IP name, and
    // resource group name.
    let combined = Output::all(vec![
        vm.output(fields::ID),
        public_ip.output(fields::NAME),
        resource_group.output(fields::NAME),
    ]);

    let lookup = evaluator.declare(
        ResourceKind::PublicIpLookup,
        "server-ip-lookup",
        object(vec![
            ("vm_id", Property::from(element(&combined, 0))),
            ("public_ip_name", Property::from(element(&combined, 1))),
            ("resource_group_name", Property::from(element(&combined, 2))),
        ]),
    )?;

    evaluator.export("public_ip", lookup.output(fields::IP_ADDRESS));

    Ok(evaluator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AdminCredentials, NetworkSection, ProjectSection, Secret, SettingsSection, VmSection,
    };
    use crate::graph::{Executor, ResourceStatus};
    use crate::provider::{MockProvision, OutputMap};
    use std::sync::Arc;

    fn test_config() -> StackConfig {
        StackConfig {
            project: ProjectSection {
                name: String::from("web-server"),
                environment: String::from("dev"),
            },
            location: String::from("westus"),
            admin: AdminCredentials {
                username: String::from("webmaster"),
                password: Secret::from(String::from("a-long-password")),
            },
            network: NetworkSection::default(),
            vm: VmSection::default(),
            settings: SettingsSection::default(),
        }
    }

    /// Provisioner stub echoing inputs as outputs and answering the IP
    /// lookup with a fixed address.
    fn stub_provisioner(expected_creates: usize) -> MockProvision {
        let mut mock = MockProvision::new();
        mock.expect_create()
            .times(expected_creates)
            .returning(|kind, name, properties| {
                let mut outputs = OutputMap::new();
                if let Some(object) = properties.as_object() {
                    for (key, value) in object {
                        outputs.insert(key.clone(), value.clone());
                    }
                }
                outputs.insert(String::from(fields::ID), json!(format!("{kind}/{name}")));
                outputs.insert(String::from(fields::NAME), json!(name));
                if kind.is_data_source() {
                    outputs.insert(String::from(fields::IP_ADDRESS), json!("40.70.12.34"));
                }
                Ok(outputs)
            });
        mock
    }

    #[test]
    fn stack_declares_the_full_chain() {
        let evaluator = web_server_stack(&test_config()).expect("stack");
        assert_eq!(evaluator.len(), 7);

        let plan = evaluator.build_plan().expect("plan");
        let position = |name: &str| {
            plan.order()
                .iter()
                .position(|id| plan.node(*id).name == name)
                .expect("resource present")
        };

        assert!(position("server") < position("server-network"));
        assert!(position("server-network") < position("server-subnet"));
        assert!(position("server-subnet") < position("server-nic"));
        assert!(position("server-nic") < position("server-vm"));
        assert!(position("server-vm") < position("server-ip-lookup"));
    }

    #[tokio::test]
    async fn apply_exports_the_allocated_address_exactly_once_all_succeed() {
        let evaluator = web_server_stack(&test_config()).expect("stack");
        let plan = evaluator.build_plan().expect("plan");

        // The stub rejects any call beyond the initial seven, so the
        // second run below doubles as the idempotence check.
        let executor = Executor::new(Arc::new(stub_provisioner(7)));
        let result = executor.execute(&plan).await.expect("execute");

        assert!(result.success);
        assert!(
            result
                .reports
                .iter()
                .all(|report| report.status == ResourceStatus::Succeeded)
        );

        let address = result.export("public_ip").expect("export");
        assert_eq!(address, &json!("40.70.12.34"));

        let rerun = executor.execute(&plan).await.expect("re-execute");
        assert_eq!(rerun.unchanged, 7);
        assert_eq!(rerun.export("public_ip").expect("export"), &json!("40.70.12.34"));
    }

    #[tokio::test]
    async fn vm_receives_resolved_nic_reference() {
        let evaluator = web_server_stack(&test_config()).expect("stack");
        let plan = evaluator.build_plan().expect("plan");

        let vm_node = plan
            .nodes()
            .iter()
            .find(|node| node.name == "server-vm")
            .expect("vm declared");

        let executor = Executor::new(Arc::new(stub_provisioner(7)));
        executor.execute(&plan).await.expect("execute");

        // The NIC id flowed into the VM's own outputs via input echoing.
        let outcome = vm_node.cell().get().expect("vm outcome");
        match outcome {
            crate::graph::ResourceOutcome::Succeeded(outputs) => {
                assert_eq!(
                    outputs.get("network_interface_ids"),
                    Some(&json!(["network-interface/server-nic"]))
                );
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn boot_script_override_is_encoded_into_custom_data() {
        let mut config = test_config();
        config.vm.boot_script = Some(String::from("echo overridden"));

        let evaluator = web_server_stack(&config).expect("stack");
        let plan = evaluator.build_plan().expect("plan");
        let vm_node = plan
            .nodes()
            .iter()
            .find(|node| node.name == "server-vm")
            .expect("vm declared");

        let Some(crate::graph::Property::Object(os_profile)) =
            vm_node.properties.get("os_profile")
        else {
            panic!("os_profile must be an object property");
        };
        let Some(crate::graph::Property::Value(custom_data)) = os_profile.get("custom_data")
        else {
            panic!("custom_data must be a literal");
        };

        let decoded = BASE64
            .decode(custom_data.as_str().expect("string"))
            .expect("valid base64");
        assert_eq!(decoded, b"echo overridden");
    }
}
