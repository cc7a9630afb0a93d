use std::path::Path;

use keepscope::{
    classfile::{member::STATIC_INITIALIZER_NAME, ClassFile},
    unit::UnitKind,
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_class,
    output::{print_output, Columns},
};

#[derive(Debug, Serialize)]
pub struct ClassInfo {
    pub name: String,
    pub kind: String,
    pub version: String,
    pub constants: usize,
    pub members: Vec<MemberRow>,
}

#[derive(Debug, Serialize)]
pub struct MemberRow {
    pub signature: String,
    pub flags: String,
    pub probed: bool,
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let class = load_class(path)?;
    let info = describe(&class)?;

    print_output(&info, opts, |info| {
        println!("Name:       {}", info.name);
        println!("Kind:       {}", info.kind);
        println!("Version:    {}", info.version);
        println!("Constants:  {}", info.constants);
        println!();

        let mut table = Columns::new(&["PROBE", "FLAGS", "SIGNATURE"]);
        for member in &info.members {
            table.push([
                if member.probed { "yes" } else { "-" }.to_string(),
                member.flags.clone(),
                member.signature.clone(),
            ]);
        }
        table.print();
    })
}

fn describe(class: &ClassFile) -> anyhow::Result<ClassInfo> {
    let pool = &class.constant_pool;
    let kind = class.kind();

    let mut members = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        let flags = method.method_flags();
        let probed = kind != UnitKind::Interface
            && flags.has_body()
            && method.name(pool)? != STATIC_INITIALIZER_NAME;

        members.push(MemberRow {
            signature: method.signature(pool)?,
            flags: flags
                .iter_names()
                .map(|(name, _)| name.to_lowercase())
                .collect::<Vec<_>>()
                .join(" "),
            probed,
        });
    }

    Ok(ClassInfo {
        name: class.dotted_name()?,
        kind: kind.to_string(),
        version: format!("{}.{}", class.major_version, class.minor_version),
        constants: pool.count(),
        members,
    })
}

#[cfg(test)]
mod tests {
    use keepscope::classfile::{
        code::CodeAttribute,
        flags::{ClassAccessFlags, MethodAccessFlags},
    };

    use super::*;

    #[test]
    fn marks_probed_members() {
        let mut class = ClassFile::new(
            "com/foo/Bar",
            "java/lang/Object",
            ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
        )
        .unwrap();
        class
            .add_method(
                MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
                "baz",
                "()V",
                Some(CodeAttribute::new(0, 0, vec![0xB1])),
            )
            .unwrap();
        class
            .add_method(
                MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
                "run",
                "()V",
                None,
            )
            .unwrap();

        let info = describe(&class).unwrap();
        assert_eq!(info.name, "com.foo.Bar");
        assert_eq!(info.kind, "class");
        assert_eq!(info.members[0].signature, "baz()V");
        assert_eq!(info.members[0].flags, "public static");
        assert!(info.members[0].probed);
        assert!(!info.members[1].probed);
    }
}
