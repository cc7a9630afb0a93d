//! Shared fixtures: class file builders and an in-memory host that loads units through the
//! registered transformers and executes probes by decoding the injected call sites.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use keepscope::{
    agent::{Agent, Instrumentation, LoadedUnit},
    classfile::{
        code::CodeAttribute,
        constant_pool::Constant,
        flags::{ClassAccessFlags, MethodAccessFlags},
        ClassFile,
    },
    transformer::{ClassFileTransformer, LoadRequest},
};

const LDC_W: u8 = 0x13;

/// A concrete class with one public `void` method per name plus a default constructor.
pub fn concrete_class(internal_name: &str, methods: &[&str]) -> Vec<u8> {
    let mut class = ClassFile::new(
        internal_name,
        "java/lang/Object",
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
    )
    .unwrap();
    class
        .add_method(
            MethodAccessFlags::PUBLIC,
            "<init>",
            "()V",
            Some(CodeAttribute::new(1, 1, vec![0x2A, 0xB7, 0x00, 0x01, 0xB1])),
        )
        .unwrap();
    for name in methods {
        class
            .add_method(
                MethodAccessFlags::PUBLIC,
                name,
                "()V",
                Some(CodeAttribute::new(0, 1, vec![0xB1])),
            )
            .unwrap();
    }
    class.to_bytes().unwrap()
}

/// A class file with the given flags and no members.
pub fn bare_class(internal_name: &str, flags: ClassAccessFlags) -> Vec<u8> {
    ClassFile::new(internal_name, "java/lang/Object", flags)
        .unwrap()
        .to_bytes()
        .unwrap()
}

/// Minimal stand-in for a JVM: a transformer chain, a set of defined units and shutdown hooks.
#[derive(Default)]
pub struct FakeVm {
    transformers: Mutex<Vec<Arc<dyn ClassFileTransformer>>>,
    hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    preloaded: Vec<LoadedUnit>,
    defined: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeVm {
    pub fn with_preloaded(preloaded: Vec<LoadedUnit>) -> Self {
        FakeVm {
            preloaded,
            ..Default::default()
        }
    }

    /// Run `bytes` through every registered transformer and define the result.
    pub fn load(&self, internal_name: &str, bytes: &[u8]) -> Vec<u8> {
        let transformers = self.transformers.lock().unwrap().clone();
        let mut current = bytes.to_vec();
        for transformer in transformers {
            if let Some(replaced) = transformer.transform(&LoadRequest::new(internal_name, &current)) {
                current = replaced;
            }
        }
        self.defined
            .lock()
            .unwrap()
            .insert(internal_name.to_string(), current.clone());
        current
    }

    /// Execute the entry of `name` + `descriptor` on a defined unit. If the body starts with
    /// an injected probe, the probe's two string arguments are forwarded to `agent`.
    ///
    /// Returns `true` if a probe fired.
    pub fn invoke(&self, agent: &Agent, internal_name: &str, name: &str, descriptor: &str) -> bool {
        let bytes = self.defined.lock().unwrap()[internal_name].clone();
        let class = ClassFile::parse(&bytes).unwrap();
        let method = class.find_method(name, descriptor).unwrap();
        let code = method.code(&class.constant_pool).unwrap().unwrap();

        match probe_arguments(&class, &code.code) {
            Some((unit, signature)) => {
                agent.record_member_used(&unit, &signature);
                true
            }
            None => false,
        }
    }

    pub fn transformer_count(&self) -> usize {
        self.transformers.lock().unwrap().len()
    }

    /// Fire every registered shutdown hook, as the host does on exit.
    pub fn exit(&self) {
        let hooks: Vec<_> = self.hooks.lock().unwrap().drain(..).collect();
        for hook in hooks {
            hook();
        }
    }
}

impl Instrumentation for FakeVm {
    fn add_transformer(&self, transformer: Arc<dyn ClassFileTransformer>) {
        self.transformers.lock().unwrap().push(transformer);
    }

    fn remove_transformer(&self, transformer: &Arc<dyn ClassFileTransformer>) -> bool {
        let mut transformers = self.transformers.lock().unwrap();
        let before = transformers.len();
        transformers.retain(|t| !Arc::ptr_eq(t, transformer));
        before != transformers.len()
    }

    fn loaded_units(&self) -> Vec<LoadedUnit> {
        self.preloaded.clone()
    }

    fn add_shutdown_hook(&self, hook: Box<dyn FnOnce() + Send>) {
        self.hooks.lock().unwrap().push(hook);
    }
}

/// Decode `ldc_w a; ldc_w b; invokestatic` at the start of `code`.
pub fn probe_arguments(class: &ClassFile, code: &[u8]) -> Option<(String, String)> {
    if code.len() < 9 || code[0] != LDC_W || code[3] != LDC_W {
        return None;
    }
    let string_at = |offset: usize| -> Option<String> {
        let index = u16::from_be_bytes([code[offset + 1], code[offset + 2]]);
        match class.constant_pool.get(index).ok()? {
            Constant::String(utf8) => class.constant_pool.utf8(*utf8).ok(),
            _ => None,
        }
    };
    Some((string_at(0)?, string_at(3)?))
}
