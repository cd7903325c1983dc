//! `ObjectModule`: the accumulate-then-`finish` writer spec §4.9 describes.
//!
//! Relocations are recorded against the `object` crate's own `SymbolId`
//! handle rather than a bare string, but that handle is still name-keyed in
//! exactly the sense spec §3.5 means: `get_or_create_symbol` is the
//! "name-to-index map" (spec §4.9 step 1/2), deduplicating by name and
//! handing out an undefined-external placeholder the first time a name is
//! referenced. Defining a function or datum later just mutates that same
//! symbol's section/value in place (`Object::symbol_mut`) rather than
//! creating a second entry, so every external appears exactly once (spec
//! §4.9 invariants) without this crate ever tracking numeric indices
//! itself — `object::write::Object::write` resolves `SymbolId`s to their
//! final Mach-O symbol table indices internally, which is the "at write
//! time" spec §3.5 describes.

use std::collections::HashMap;
use std::str::FromStr;

use cot_codegen::isa::arm64::{EncodedFunction, RelocKind};
use log::debug;
use object::write::{
    Object, Relocation, RelocationFlags, Symbol, SymbolId, SymbolSection,
};
use object::{Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope};
use target_lexicon::Triple;

use crate::result::{ObjectError, ObjectResult};

/// Darwin C ABI: every external symbol name is prefixed with `_` (spec
/// §6.4). Applied once, here, so no other module has to remember it.
fn darwin_name(name: &str) -> String {
    format!("_{name}")
}

pub struct ObjectModule {
    obj: Object<'static>,
    text: object::write::SectionId,
    data: object::write::SectionId,
    cstring: object::write::SectionId,
    symbols: HashMap<String, SymbolId>,
    /// Symbols that have been given a real definition (as opposed to a
    /// placeholder created only because a relocation named them). Used to
    /// reject a second `define_function`/`define_data` under the same name
    /// and, in `finish`, to tell a genuine external apart from one that
    /// was merely referenced and never defined.
    defined: HashMap<String, bool>,
    allow_undefined_externals: bool,
}

impl ObjectModule {
    /// `triple` must be the one target this core ever compiles for (spec
    /// §6.1); checked here the same way `cot_codegen::settings::Flags::new`
    /// checks it, so a caller can just pass `flags.triple()` through.
    ///
    /// `allow_undefined_externals`: spec §4.9's normal mode, where a
    /// relocation target with no internal definition becomes an undefined
    /// external for the host linker to resolve (this is how `malloc`,
    /// `__cot_str_concat`, and the rest of the companion runtime's symbols
    /// reach the object file). Set to `false` to turn that case into
    /// `ObjectError::UnresolvedExternal` instead (spec §7's
    /// `E_RELOC_UNRESOLVED`, "the user did not request unresolved
    /// externals").
    pub fn new(triple: &Triple, allow_undefined_externals: bool) -> Self {
        assert_eq!(
            triple,
            &Triple::from_str(cot_codegen::settings::SUPPORTED_TRIPLE).expect("valid built-in triple"),
            "cot-object only writes {} objects",
            cot_codegen::settings::SUPPORTED_TRIPLE
        );
        let mut obj = Object::new(BinaryFormat::MachO, Architecture::Aarch64, Endianness::Little);
        let text = obj.add_section(
            obj.segment_name(object::write::StandardSegment::Text).to_vec(),
            b"__text".to_vec(),
            SectionKind::Text,
        );
        let data = obj.add_section(
            obj.segment_name(object::write::StandardSegment::Data).to_vec(),
            b"__data".to_vec(),
            SectionKind::Data,
        );
        let cstring = obj.add_section(
            obj.segment_name(object::write::StandardSegment::Text).to_vec(),
            b"__cstring".to_vec(),
            SectionKind::ReadOnlyString,
        );
        Self {
            obj,
            text,
            data,
            cstring,
            symbols: HashMap::new(),
            defined: HashMap::new(),
            allow_undefined_externals,
        }
    }

    /// Look up `name`'s symbol, creating an undefined-external placeholder
    /// the first time it's seen (spec §4.9 step 1: "append an undefined
    /// external entry (once...)").
    fn get_or_create_symbol(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.symbols.get(name) {
            return id;
        }
        let id = self.obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: 0,
            size: 0,
            kind: SymbolKind::Unknown,
            scope: SymbolScope::Dynamic,
            weak: false,
            section: SymbolSection::Undefined,
            flags: SymbolFlags::None,
        });
        self.symbols.insert(name.to_string(), id);
        self.defined.insert(name.to_string(), false);
        id
    }

    fn reloc_flags(kind: RelocKind) -> RelocationFlags {
        // Mach-O ARM64 relocation type codes (spec §6.4, §4.8.3): the
        // emitter only ever asks for these three, one per `RelocKind`
        // variant.
        let (r_type, r_pcrel) = match kind {
            RelocKind::AdrpPage => (object::macho::ARM64_RELOC_PAGE21, true),
            RelocKind::AddPageOff => (object::macho::ARM64_RELOC_PAGEOFF12, false),
            RelocKind::Branch26 => (object::macho::ARM64_RELOC_BRANCH26, true),
        };
        RelocationFlags::MachO {
            r_type,
            r_pcrel,
            r_length: 2, // log2(4): every relocation here patches a 4-byte instruction word.
        }
    }

    /// Append one function's code and relocations (spec §5: "each
    /// function's code and relocations are appended as a unit after that
    /// function's emitter finishes").
    pub fn define_function(&mut self, name: &str, encoded: &EncodedFunction) -> ObjectResult<()> {
        let sym_name = darwin_name(name);
        if *self.defined.get(&sym_name).unwrap_or(&false) {
            return Err(ObjectError::DuplicateDefinition(sym_name));
        }

        let base = self.obj.append_section_data(self.text, &encoded.code, 4);
        let id = self.get_or_create_symbol(&sym_name);
        let sym = self.obj.symbol_mut(id);
        sym.kind = SymbolKind::Text;
        sym.section = SymbolSection::Section(self.text);
        sym.value = base;
        sym.size = encoded.code.len() as u64;
        sym.scope = SymbolScope::Linkage;
        debug!("{sym_name}: {} bytes at __text+{base:#x}, {} relocation(s)", encoded.code.len(), encoded.relocs.len());
        self.defined.insert(sym_name, true);

        for r in &encoded.relocs {
            let target_name = darwin_name(&r.symbol);
            let target = self.get_or_create_symbol(&target_name);
            self.obj
                .add_relocation(
                    self.text,
                    Relocation {
                        offset: base + r.code_offset as u64,
                        symbol: target,
                        addend: 0,
                        flags: Self::reloc_flags(r.kind),
                    },
                )
                .map_err(ObjectError::Write)?;
        }
        Ok(())
    }

    /// A mutable global (spec §3.5's `__data` section).
    pub fn define_data(&mut self, name: &str, bytes: &[u8]) -> ObjectResult<()> {
        let sym_name = darwin_name(name);
        if *self.defined.get(&sym_name).unwrap_or(&false) {
            return Err(ObjectError::DuplicateDefinition(sym_name));
        }
        let base = self.obj.append_section_data(self.data, bytes, 8);
        let id = self.get_or_create_symbol(&sym_name);
        let sym = self.obj.symbol_mut(id);
        sym.kind = SymbolKind::Data;
        sym.section = SymbolSection::Section(self.data);
        sym.value = base;
        sym.size = bytes.len() as u64;
        sym.scope = SymbolScope::Linkage;
        self.defined.insert(sym_name, true);
        Ok(())
    }

    /// A string literal (spec §6.4: "null-terminated in the data section").
    /// `name` is the global the frontend already minted for it
    /// (`__cot_str_{n}`, see `cot-frontend::translate::string_pair`) —
    /// this crate doesn't choose string names, it just lays out the bytes
    /// the caller already decided to call `name`.
    pub fn define_string_literal(&mut self, name: &str, bytes: &[u8]) -> ObjectResult<()> {
        let sym_name = darwin_name(name);
        if *self.defined.get(&sym_name).unwrap_or(&false) {
            return Err(ObjectError::DuplicateDefinition(sym_name));
        }
        let mut terminated = Vec::with_capacity(bytes.len() + 1);
        terminated.extend_from_slice(bytes);
        terminated.push(0);
        let base = self.obj.append_section_data(self.cstring, &terminated, 1);
        let id = self.get_or_create_symbol(&sym_name);
        let sym = self.obj.symbol_mut(id);
        sym.kind = SymbolKind::Data;
        sym.section = SymbolSection::Section(self.cstring);
        sym.value = base;
        sym.size = terminated.len() as u64;
        sym.scope = SymbolScope::Compilation;
        self.defined.insert(sym_name, true);
        Ok(())
    }

    /// Finish the module: validate every relocation target resolved (spec
    /// §4.9 invariant: "every relocation's symbol index is valid"), then
    /// hand off to `object::write::Object::write` for the actual Mach-O
    /// header, load command, and symbol/string table encoding.
    pub fn finish(self) -> ObjectResult<Vec<u8>> {
        if !self.allow_undefined_externals {
            for (name, is_defined) in &self.defined {
                if !is_defined {
                    return Err(ObjectError::UnresolvedExternal("<module>".to_string(), name.clone()));
                }
            }
        }
        debug!("writing Mach-O object: {} symbol(s)", self.symbols.len());
        self.obj.write().map_err(ObjectError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cot_codegen::isa::arm64::Reloc;

    fn triple() -> Triple {
        Triple::from_str(cot_codegen::settings::SUPPORTED_TRIPLE).unwrap()
    }

    fn leaf_function() -> EncodedFunction {
        // `ret` only: C0 03 5F D6 in little-endian bytes.
        EncodedFunction {
            code: vec![0xC0, 0x03, 0x5F, 0xD6],
            relocs: vec![],
        }
    }

    #[test]
    fn defining_a_function_creates_exactly_one_symbol_for_it() {
        let mut m = ObjectModule::new(&triple(), true);
        m.define_function("main", &leaf_function()).unwrap();
        assert_eq!(m.symbols.len(), 1);
        assert!(m.symbols.contains_key("_main"));
    }

    #[test]
    fn redefining_the_same_function_is_rejected() {
        let mut m = ObjectModule::new(&triple(), true);
        m.define_function("main", &leaf_function()).unwrap();
        let err = m.define_function("main", &leaf_function()).unwrap_err();
        assert!(matches!(err, ObjectError::DuplicateDefinition(_)));
    }

    #[test]
    fn a_call_to_an_undefined_name_becomes_one_external_symbol() {
        let mut m = ObjectModule::new(&triple(), true);
        let encoded = EncodedFunction {
            code: vec![0; 8],
            relocs: vec![Reloc {
                code_offset: 4,
                symbol: "malloc".to_string(),
                kind: RelocKind::Branch26,
            }],
        };
        m.define_function("uses_malloc", &encoded).unwrap();
        assert!(m.symbols.contains_key("_malloc"));
        assert_eq!(*m.defined.get("_malloc").unwrap(), false);
    }

    #[test]
    fn strict_mode_rejects_an_undefined_external_at_finish() {
        let mut m = ObjectModule::new(&triple(), false);
        let encoded = EncodedFunction {
            code: vec![0; 8],
            relocs: vec![Reloc {
                code_offset: 4,
                symbol: "malloc".to_string(),
                kind: RelocKind::Branch26,
            }],
        };
        m.define_function("uses_malloc", &encoded).unwrap();
        let err = m.finish().unwrap_err();
        assert!(matches!(err, ObjectError::UnresolvedExternal(_, _)));
    }

    #[test]
    fn a_complete_module_writes_a_mach_o_buffer() {
        let mut m = ObjectModule::new(&triple(), true);
        m.define_function("answer", &leaf_function()).unwrap();
        m.define_string_literal("__cot_str_0", b"hi").unwrap();
        let bytes = m.finish().unwrap();
        // Mach-O magic for a 64-bit little-endian object (spec §6.2:
        // "magic 0xFEEDFACF").
        assert_eq!(&bytes[0..4], &0xFEEDFACFu32.to_le_bytes());
    }
}
