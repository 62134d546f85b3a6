use std::io;

use crate::{module::FuncRef, Function, InstData, InstId, Module, ValueId};

/// Writes an IR entity whose textual form depends on module level context,
/// e.g., function and global symbol names.
pub trait WriteWithModule {
    fn write(&self, module: &Module, w: &mut impl io::Write) -> io::Result<()>;

    fn dump_string(&self, module: &Module) -> String {
        let mut s = Vec::new();
        self.write(module, &mut s).unwrap();
        String::from_utf8(s).unwrap()
    }
}

pub struct ModuleWriter<'a> {
    module: &'a Module,
}

impl<'a> ModuleWriter<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }

    pub fn write(&mut self, mut w: impl io::Write) -> io::Result<()> {
        // Write module level global variables.
        for gv in self.module.globals.all_gv_data() {
            gv.write(self.module, &mut w)?;
        }
        writeln!(w)?;

        for func_ref in self.module.funcs.keys() {
            let mut func_writer = FuncWriter::new(self.module, func_ref);
            func_writer.write(&mut w)?;
            writeln!(w)?;
        }

        Ok(())
    }

    pub fn dump_string(&mut self) -> String {
        let mut s = Vec::new();
        self.write(&mut s).unwrap();
        String::from_utf8(s).unwrap()
    }
}

pub struct FuncWriter<'a> {
    module: &'a Module,
    func: &'a Function,
    level: u8,
}

impl<'a> FuncWriter<'a> {
    pub fn new(module: &'a Module, func_ref: FuncRef) -> Self {
        Self {
            module,
            func: &module.funcs[func_ref],
            level: 0,
        }
    }

    pub fn write(&mut self, mut w: impl io::Write) -> io::Result<()> {
        self.func.sig.write(self.module, &mut w)?;
        if !self.func.is_definition() {
            return writeln!(w, ";");
        }

        writeln!(w, " {{")?;
        self.level += 1;

        for (idx, block) in self.func.layout.iter_block().enumerate() {
            if idx > 0 {
                writeln!(w)?;
            }
            self.indent(&mut w)?;
            writeln!(w, "{block}:")?;

            self.level += 1;
            for inst in self.func.layout.iter_inst(block) {
                self.indent(&mut w)?;
                self.write_inst(inst, &mut w)?;
                writeln!(w, ";")?;
            }
            self.level -= 1;
        }

        self.level -= 1;
        writeln!(w, "}}")
    }

    pub fn dump_string(&mut self) -> String {
        let mut s = Vec::new();
        self.write(&mut s).unwrap();
        String::from_utf8(s).unwrap()
    }

    fn write_inst(&self, inst: InstId, w: &mut impl io::Write) -> io::Result<()> {
        if let Some(result) = self.func.dfg.inst_result(inst) {
            self.write_value(result, w)?;
            write!(w, " = ")?;
        }

        let data = self.func.dfg.inst(inst);
        write!(w, "{}", data.name())?;
        match data {
            InstData::AllocStack | InstData::AllocBox => Ok(()),
            InstData::ProjectBox { boxed } => self.write_values(&[*boxed], w),
            InstData::RefElementAddr { object: base, field }
            | InstData::StructElementAddr { base, field } => {
                self.write_values(&[*base], w)?;
                write!(w, " #{field}")
            }
            InstData::BeginAccess(marker) | InstData::BeginUnpairedAccess(marker) => {
                write!(w, " [{}] [{}]", marker.kind, marker.enforcement)?;
                if marker.no_nested_conflict {
                    write!(w, " [no_nested_conflict]")?;
                }
                self.write_values(&[marker.source], w)
            }
            InstData::EndAccess { access } => self.write_values(&[*access], w),
            InstData::Load { addr } => self.write_values(&[*addr], w),
            InstData::Store { value, addr } => self.write_values(&[*value, *addr], w),
            InstData::FunctionRef { func } => {
                write!(w, " %{}", self.module.func_name(*func))
            }
            InstData::ClassMethod {
                object,
                candidates,
                is_complete,
            } => {
                self.write_values(&[*object], w)?;
                write!(w, " [")?;
                for (idx, func) in candidates.iter().enumerate() {
                    if idx > 0 {
                        write!(w, ", ")?;
                    }
                    write!(w, "%{}", self.module.func_name(*func))?;
                }
                write!(w, "]")?;
                if !is_complete {
                    write!(w, " incomplete")?;
                }
                Ok(())
            }
            InstData::PartialApply { callee, args } | InstData::Apply { callee, args } => {
                self.write_values(&[*callee], w)?;
                self.write_values(args, w)
            }
            InstData::Jump { dest } => write!(w, " {dest}"),
            InstData::Br {
                cond,
                then_dest,
                else_dest,
            } => {
                self.write_values(&[*cond], w)?;
                write!(w, " {then_dest} {else_dest}")
            }
            InstData::Return { arg } => match arg {
                Some(arg) => self.write_values(&[*arg], w),
                None => Ok(()),
            },
        }
    }

    fn write_values(&self, values: &[ValueId], w: &mut impl io::Write) -> io::Result<()> {
        for value in values {
            write!(w, " ")?;
            self.write_value(*value, w)?;
        }
        Ok(())
    }

    fn write_value(&self, value: ValueId, w: &mut impl io::Write) -> io::Result<()> {
        match self.func.dfg.value(value) {
            crate::Value::Global { gv } => {
                write!(w, "%{}", self.module.globals.gv_data(*gv).symbol)
            }
            _ => write!(w, "v{}", value.0),
        }
    }

    fn indent(&self, w: &mut impl io::Write) -> io::Result<()> {
        for _ in 0..self.level {
            write!(w, "    ")?;
        }
        Ok(())
    }
}
