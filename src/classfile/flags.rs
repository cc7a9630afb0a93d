//! Access flags for classes and methods as defined by the JVM class file format.
//!
//! # Key Types
//! - [`ClassAccessFlags`]: `access_flags` of the `ClassFile` structure
//! - [`MethodAccessFlags`]: `access_flags` of a `method_info` structure

use bitflags::bitflags;

use crate::unit::UnitKind;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class access and property modifiers
    pub struct ClassAccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared final; no subclasses allowed
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by `invokespecial`
        const SUPER = 0x0020;
        /// Is an interface, not a class
        const INTERFACE = 0x0200;
        /// Declared abstract; must not be instantiated
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class
        const ENUM = 0x4000;
        /// Is a module, not a class or interface
        const MODULE = 0x8000;
    }
}

impl ClassAccessFlags {
    /// Classify the unit these flags belong to.
    ///
    /// Annotation types carry `INTERFACE` as well and classify as interfaces.
    #[must_use]
    pub fn kind(self) -> UnitKind {
        if self.contains(Self::INTERFACE) {
            UnitKind::Interface
        } else if self.contains(Self::ENUM) {
            UnitKind::Enum
        } else {
            UnitKind::Class
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access and property modifiers
    pub struct MethodAccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final; must not be overridden
        const FINAL = 0x0010;
        /// Declared synchronized
        const SYNCHRONIZED = 0x0020;
        /// A bridge method, generated by the compiler
        const BRIDGE = 0x0040;
        /// Declared with variable number of arguments
        const VARARGS = 0x0080;
        /// Declared native; implemented outside the JVM
        const NATIVE = 0x0100;
        /// Declared abstract; no implementation is provided
        const ABSTRACT = 0x0400;
        /// In a class file whose major version is 46 to 60, declared strictfp
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
    }
}

impl MethodAccessFlags {
    /// Returns `true` if the method carries a body that can receive injected code.
    #[must_use]
    pub fn has_body(self) -> bool {
        !self.intersects(Self::ABSTRACT | Self::NATIVE)
    }
}
