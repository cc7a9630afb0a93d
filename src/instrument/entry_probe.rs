use crate::{
    classfile::{member::STATIC_INITIALIZER_NAME, ClassFile},
    instrument::{ProbeTarget, Rewrite, Rewriter},
    unit::UnitKind,
    Error, Result,
};

const LDC_W: u8 = 0x13;
const INVOKESTATIC: u8 = 0xB8;
const NOP: u8 = 0x00;

/// Operand stack slots used by the probe: two string references.
const PROBE_STACK: u16 = 2;

/// Injects a call to a [`ProbeTarget`] at the start of every concrete constructor and method.
///
/// The injected sequence is
///
/// ```text
/// ldc_w        "<dotted unit name>"
/// ldc_w        "<dotted unit name>.<name><descriptor>"
/// invokestatic <probe owner>.<probe method>(Ljava/lang/String;Ljava/lang/String;)V
/// nop; nop; nop
/// ```
///
/// which is 12 bytes, keeping switch padding intact. It is valid before the superclass
/// constructor call in `<init>` because it never touches `this`. Abstract and native members
/// have no body and the static initializer is not a member; all three are skipped.
///
/// # Examples
///
/// ```rust
/// use keepscope::classfile::{code::CodeAttribute, flags::*, ClassFile};
/// use keepscope::instrument::{EntryProbeRewriter, ProbeTarget, Rewrite, Rewriter};
///
/// let mut class = ClassFile::new("com/foo/Bar", "java/lang/Object", ClassAccessFlags::PUBLIC)?;
/// class.add_method(
///     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
///     "baz",
///     "()V",
///     Some(CodeAttribute::new(0, 0, vec![0xB1])),
/// )?;
///
/// let rewriter = EntryProbeRewriter::new(ProbeTarget::default());
/// match rewriter.rewrite(&class.to_bytes()?)? {
///     Rewrite::Instrumented { probes, .. } => assert_eq!(probes, 1),
///     Rewrite::Interface => unreachable!(),
/// }
/// # Ok::<(), keepscope::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntryProbeRewriter {
    probe: ProbeTarget,
}

impl EntryProbeRewriter {
    /// Create a rewriter that injects calls to `probe`.
    #[must_use]
    pub fn new(probe: ProbeTarget) -> Self {
        EntryProbeRewriter { probe }
    }

    /// The probe this rewriter injects.
    #[must_use]
    pub fn probe(&self) -> &ProbeTarget {
        &self.probe
    }

    /// Instrument a parsed unit in place and return the number of probed members.
    ///
    /// # Errors
    /// Returns an error if the constant pool overflows, a body cannot be relocated, or a
    /// concrete member has no `Code` attribute. The unit is in an unspecified state afterwards.
    pub fn instrument(&self, class: &mut ClassFile) -> Result<usize> {
        let unit = class.dotted_name()?;
        let ClassFile {
            constant_pool,
            methods,
            ..
        } = class;

        let probe_ref =
            constant_pool.add_method_ref(self.probe.owner(), self.probe.method(), self.probe.descriptor())?;
        let unit_string = constant_pool.add_string(&unit)?;

        let mut probes = 0;
        for method in methods.iter_mut() {
            if !method.method_flags().has_body() {
                continue;
            }
            let name = method.name(constant_pool)?;
            if name == STATIC_INITIALIZER_NAME {
                continue;
            }

            let signature = format!("{unit}.{}", method.signature(constant_pool)?);
            let Some(position) = method.code_position(constant_pool)? else {
                return Err(malformed_error!("Concrete method {} has no Code attribute", signature));
            };

            let signature_string = constant_pool.add_string(&signature)?;
            let prefix = probe_prefix(unit_string, signature_string, probe_ref);

            let mut body = method
                .code(constant_pool)?
                .ok_or_else(|| Error::Error(format!("Code attribute of {signature} vanished")))?;
            body.prepend(&prefix, PROBE_STACK, constant_pool)?;
            method.attributes[position].info = body.to_bytes()?;
            probes += 1;
        }

        Ok(probes)
    }
}

impl Rewriter for EntryProbeRewriter {
    fn rewrite(&self, class_bytes: &[u8]) -> Result<Rewrite> {
        let mut class = ClassFile::parse(class_bytes)?;
        let kind = class.kind();
        if kind == UnitKind::Interface {
            return Ok(Rewrite::Interface);
        }

        let probes = self.instrument(&mut class)?;
        Ok(Rewrite::Instrumented {
            kind,
            bytes: class.to_bytes()?,
            probes,
        })
    }

    fn probe_owner(&self) -> Option<&str> {
        Some(self.probe.owner())
    }
}

#[rustfmt::skip]
fn probe_prefix(unit_string: u16, signature_string: u16, probe_ref: u16) -> [u8; 12] {
    let [unit_hi, unit_lo] = unit_string.to_be_bytes();
    let [sig_hi, sig_lo] = signature_string.to_be_bytes();
    let [ref_hi, ref_lo] = probe_ref.to_be_bytes();

    [
        LDC_W, unit_hi, unit_lo,
        LDC_W, sig_hi, sig_lo,
        INVOKESTATIC, ref_hi, ref_lo,
        NOP, NOP, NOP,
    ]
}
