use std::error::Error as _;

use super::*;
use crate::config::{Configuration, KEY_EXTERNAL_AUTHORIZATION_CLASS, KEY_PATH_POLICY_PREFIX};
use crate::error::{AuthError, AuthResult, ProvisioningCause};

/// Accepts exactly `/allowed`.
#[derive(Default)]
struct StubAuthorizer {
    initialized: bool,
}

impl Authorizer for StubAuthorizer {
    fn init(&mut self, _conf: &Configuration) -> AuthResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn is_authorized(&self, _access: AccessType, paths: &[&str]) -> AuthResult<bool> {
        if !self.initialized {
            return Err(AuthError::authorization("used before init"));
        }
        authorize_each(paths, |p| Ok(p == "/allowed"))
    }
}

struct UnreachableBackend;

impl Authorizer for UnreachableBackend {
    fn init(&mut self, _conf: &Configuration) -> AuthResult<()> {
        Err(AuthError::authorization("policy backend unreachable"))
    }

    fn is_authorized(&self, _access: AccessType, _paths: &[&str]) -> AuthResult<bool> { Ok(true) }
}

fn stub_ctor() -> AuthResult<Box<dyn Authorizer>> { Ok(Box::new(StubAuthorizer::default())) }
fn unreachable_ctor() -> AuthResult<Box<dyn Authorizer>> { Ok(Box::new(UnreachableBackend)) }
fn broken_ctor() -> AuthResult<Box<dyn Authorizer>> { Err(AuthError::config("missing native library")) }

fn registry() -> AuthorizerRegistry {
    let mut reg = AuthorizerRegistry::with_builtins();
    reg.register("test.StubAuthorizer", stub_ctor)
        .register("test.UnreachableBackend", unreachable_ctor)
        .register("test.Broken", broken_ctor);
    reg
}

fn conf_naming(name: &str) -> Configuration {
    [(KEY_EXTERNAL_AUTHORIZATION_CLASS, name)].into_iter().collect()
}

#[test]
fn stub_gate_requires_every_path() {
    let gate = registry().create(&conf_naming("test.StubAuthorizer")).unwrap().expect("gate installed");
    assert!(gate.is_authorized(AccessType::Write, &["/allowed"]).unwrap());
    assert!(!gate.is_authorized(AccessType::Write, &["/allowed", "/denied"]).unwrap());
}

#[test]
fn nothing_configured_means_no_gate() {
    assert!(registry().create(&Configuration::new()).unwrap().is_none());
    assert!(create_authorizer(&Configuration::new()).unwrap().is_none());
}

#[test]
fn unknown_name_is_provisioning_error() {
    let err = registry().create(&conf_naming("class.does.not.exist")).err().expect("must fail");
    match &err {
        AuthError::Provisioning { name, source: ProvisioningCause::NotFound } => {
            assert_eq!(name, "class.does.not.exist");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.code_str(), "provisioning_error");
}

#[test]
fn init_failure_is_provisioning_error_with_cause() {
    let err = registry().create(&conf_naming("test.UnreachableBackend")).err().expect("must fail");
    assert!(matches!(err, AuthError::Provisioning { source: ProvisioningCause::Init(_), .. }));
    let root = err.source().and_then(|c| c.source()).expect("init cause");
    assert!(root.to_string().contains("policy backend unreachable"));
}

#[test]
fn construction_failure_is_provisioning_error() {
    let err = registry().create(&conf_naming("test.Broken")).err().expect("must fail");
    assert!(matches!(err, AuthError::Provisioning { source: ProvisioningCause::Construction(_), .. }));
}

#[test]
fn builtin_path_policy_is_provisioned_and_initialized() {
    let mut conf = conf_naming(PATH_POLICY_AUTHORIZER);
    conf.set(format!("{KEY_PATH_POLICY_PREFIX}write"), "/allowed/**");
    let gate = create_authorizer(&conf).unwrap().expect("gate installed");
    assert!(gate.is_authorized(AccessType::Write, &["/allowed/x"]).unwrap());
    assert!(!gate.is_authorized(AccessType::Write, &["/allowed/x", "/denied"]).unwrap());
}

#[test]
fn global_registration_is_visible_to_create() {
    register_authorizer("test.GlobalStub", stub_ctor);
    let gate = create_authorizer(&conf_naming("test.GlobalStub")).unwrap().expect("gate installed");
    assert!(gate.is_authorized(AccessType::Read, &["/allowed"]).unwrap());
}

#[test]
fn gate_is_shareable_across_threads() {
    let gate = registry().create(&conf_naming("test.StubAuthorizer")).unwrap().expect("gate installed");
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let g = gate.clone();
            std::thread::spawn(move || {
                let p = if i % 2 == 0 { "/allowed" } else { "/denied" };
                g.is_authorized(AccessType::Read, &[p]).unwrap()
            })
        })
        .collect();
    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![true, false, true, false]);
}
