//! Process-wide extension registry.
//!
//! Bindings are keyed in several directions at once: identifier to type token
//! for dynamic decoding, and type token to encode/decode adapter for the typed
//! entry points. Registering a type `T` also installs a parallel binding for
//! `Option<T>`, so optional fields encode `None` as the host nil and decoding
//! into an empty optional transparently materializes the value.
//!
//! Mutation (register/unregister) takes the write lock and performs
//! remove-then-insert under a single acquisition, so a strictly-after reader
//! never observes a partial binding. Lookups take the read lock and clone the
//! adapter out before invoking it, so no lock is held across user code.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::{Error, Result};

/// Marshal/unmarshal capability pair for the convenience registration path.
///
/// `marshal_ext` produces the opaque payload bytes that follow the extension
/// header; `unmarshal_ext` reconstructs the value from exactly those bytes.
pub trait ExtPayload {
    /// Produce the extension payload bytes for this value.
    fn marshal_ext(&self) -> Result<Vec<u8>>;

    /// Reconstruct this value from the extension payload bytes.
    fn unmarshal_ext(&mut self, payload: &[u8]) -> Result<()>;
}

type EncodeAdapter = Arc<dyn Fn(&mut Encoder<'_>, &dyn Any) -> Result<()> + Send + Sync>;
type DecodeAdapter = Arc<dyn Fn(&mut Decoder<'_>, &mut dyn Any) -> Result<()> + Send + Sync>;

/// Descriptor backing the dynamic decode path: how to allocate a fresh
/// instance of the registered type and how to decode into it.
pub(crate) struct DynamicExt {
    pub(crate) type_name: &'static str,
    pub(crate) construct: Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>,
    pub(crate) decode:
        Box<dyn Fn(&mut Decoder<'_>, &mut dyn Any, usize) -> Result<()> + Send + Sync>,
}

#[derive(Default)]
struct Registry {
    /// identifier -> (T, Option<T>) type tokens for the encoder side.
    enc_ids: HashMap<String, (TypeId, TypeId)>,
    encoders: HashMap<TypeId, EncodeAdapter>,
    /// identifier -> (T, Option<T>) type tokens for the decoder side.
    dec_ids: HashMap<String, (TypeId, TypeId)>,
    decoders: HashMap<TypeId, DecodeAdapter>,
    dynamic: HashMap<String, Arc<DynamicExt>>,
}

impl Registry {
    fn unregister_encoder(&mut self, ext_id: &str) {
        if let Some((ty, opt_ty)) = self.enc_ids.remove(ext_id) {
            self.encoders.remove(&ty);
            self.encoders.remove(&opt_ty);
        }
    }

    fn unregister_decoder(&mut self, ext_id: &str) {
        if let Some((ty, opt_ty)) = self.dec_ids.remove(ext_id) {
            self.decoders.remove(&ty);
            self.decoders.remove(&opt_ty);
        }
        self.dynamic.remove(ext_id);
    }
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

fn downcast_value<T: 'static>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or(Error::ValueTypeMismatch {
        expected: type_name::<T>(),
    })
}

fn downcast_dest<T: 'static>(dest: &mut dyn Any) -> Result<&mut T> {
    dest.downcast_mut::<T>().ok_or(Error::ValueTypeMismatch {
        expected: type_name::<T>(),
    })
}

fn write_ext(enc: &mut Encoder<'_>, ext_id: &str, payload: &[u8]) -> Result<()> {
    enc.encode_ext_header(ext_id, payload.len())?;
    enc.write(payload)
}

/// Register an extension type with encode and decode logic derived from its
/// [`ExtPayload`] implementation.
///
/// Equivalent to [`register_encoder`] followed by [`register_decoder`] with
/// closures that call `marshal_ext` / `unmarshal_ext`. Re-registering an
/// identifier replaces the previous binding.
pub fn register<T>(ext_id: &str)
where
    T: ExtPayload + Default + Send + Sync + 'static,
{
    register_encoder::<T, _>(ext_id, |_enc: &mut Encoder<'_>, v: &T| v.marshal_ext());
    register_decoder::<T, _>(ext_id, |dec: &mut Decoder<'_>, v: &mut T, ext_len: usize| {
        let payload = dec.read_n(ext_len)?;
        v.unmarshal_ext(&payload)
    });
}

/// Register encode logic for `T` under `ext_id`.
///
/// Any existing encoder binding for `ext_id` is removed first. `encode_fn`
/// produces the opaque payload bytes; the surrounding adapter writes the
/// extension header and the payload, and short-circuits `Option<T>` values of
/// `None` to the host nil with no header at all.
pub fn register_encoder<T, F>(ext_id: &str, encode_fn: F)
where
    T: Send + Sync + 'static,
    F: Fn(&mut Encoder<'_>, &T) -> Result<Vec<u8>> + Send + Sync + 'static,
{
    let ext_id = ext_id.to_owned();
    let encode_fn = Arc::new(encode_fn);

    let adapter: EncodeAdapter = {
        let ext_id = ext_id.clone();
        let encode_fn = encode_fn.clone();
        Arc::new(move |enc, value| {
            let value = downcast_value::<T>(value)?;
            let payload = encode_fn(enc, value)?;
            write_ext(enc, &ext_id, &payload)
        })
    };

    let opt_adapter: EncodeAdapter = {
        let ext_id = ext_id.clone();
        let encode_fn = encode_fn.clone();
        Arc::new(move |enc, value| match downcast_value::<Option<T>>(value)? {
            None => enc.encode_nil(),
            Some(inner) => {
                let payload = encode_fn(enc, inner)?;
                write_ext(enc, &ext_id, &payload)
            }
        })
    };

    let mut reg = registry().write();
    reg.unregister_encoder(&ext_id);
    reg.enc_ids.insert(
        ext_id.clone(),
        (TypeId::of::<T>(), TypeId::of::<Option<T>>()),
    );
    reg.encoders.insert(TypeId::of::<T>(), adapter);
    reg.encoders.insert(TypeId::of::<Option<T>>(), opt_adapter);
    drop(reg);

    debug!(ext_id = %ext_id, ty = type_name::<T>(), "registered extension encoder");
}

/// Register decode logic for `T` under `ext_id`.
///
/// Any existing decoder binding for `ext_id` is removed first. `decode_fn`
/// receives the decoder, the destination, and the payload length, and must
/// consume exactly that many bytes from the stream. The surrounding adapter
/// reads the header and rejects identifiers other than `ext_id`; the
/// `Option<T>` binding additionally maps a wire nil to `None` and fills an
/// empty destination with `T::default()` before delegating. The same
/// `decode_fn` also backs the dynamic decode path for `ext_id`.
pub fn register_decoder<T, F>(ext_id: &str, decode_fn: F)
where
    T: Default + Send + Sync + 'static,
    F: Fn(&mut Decoder<'_>, &mut T, usize) -> Result<()> + Send + Sync + 'static,
{
    let ext_id = ext_id.to_owned();
    let decode_fn = Arc::new(decode_fn);

    let adapter: DecodeAdapter = {
        let wanted = ext_id.clone();
        let decode_fn = decode_fn.clone();
        Arc::new(move |dec, dest| {
            let dest = downcast_dest::<T>(dest)?;
            let (got, payload_len) = dec.decode_ext_header()?;
            if got != wanted {
                return Err(Error::MismatchedExtId {
                    got,
                    wanted: wanted.clone(),
                });
            }
            decode_fn(dec, dest, payload_len)
        })
    };

    let opt_adapter: DecodeAdapter = {
        let wanted = ext_id.clone();
        let decode_fn = decode_fn.clone();
        Arc::new(move |dec, dest| {
            let dest = downcast_dest::<Option<T>>(dest)?;
            let c = dec.read_code()?;
            if c == crate::codes::NIL {
                *dest = None;
                return Ok(());
            }
            let (got, payload_len) = dec.decode_ext_header_from(c)?;
            if got != wanted {
                return Err(Error::MismatchedExtId {
                    got,
                    wanted: wanted.clone(),
                });
            }
            let slot = dest.get_or_insert_with(T::default);
            decode_fn(dec, slot, payload_len)
        })
    };

    let dynamic = Arc::new(DynamicExt {
        type_name: type_name::<T>(),
        construct: Box::new(|| Box::new(T::default())),
        decode: {
            let decode_fn = decode_fn.clone();
            Box::new(move |dec, dest, payload_len| {
                let dest = downcast_dest::<T>(dest)?;
                decode_fn(dec, dest, payload_len)
            })
        },
    });

    let mut reg = registry().write();
    reg.unregister_decoder(&ext_id);
    reg.dec_ids.insert(
        ext_id.clone(),
        (TypeId::of::<T>(), TypeId::of::<Option<T>>()),
    );
    reg.decoders.insert(TypeId::of::<T>(), adapter);
    reg.decoders.insert(TypeId::of::<Option<T>>(), opt_adapter);
    reg.dynamic.insert(ext_id.clone(), dynamic);
    drop(reg);

    debug!(ext_id = %ext_id, ty = type_name::<T>(), "registered extension decoder");
}

/// Remove the binding for `ext_id` in every lookup direction.
///
/// Removes the encoder binding (type and `Option` type), the decoder binding
/// (type and `Option` type), and the dynamic descriptor under one write-lock
/// acquisition. No-op for unknown identifiers.
pub fn unregister(ext_id: &str) {
    let mut reg = registry().write();
    reg.unregister_encoder(ext_id);
    reg.unregister_decoder(ext_id);
    drop(reg);

    debug!(ext_id, "unregistered extension");
}

/// Whether any binding (encoder or decoder side) exists for `ext_id`.
pub fn is_registered(ext_id: &str) -> bool {
    let reg = registry().read();
    reg.enc_ids.contains_key(ext_id) || reg.dec_ids.contains_key(ext_id)
}

/// Identifiers with at least one live binding, sorted.
pub fn registered_ext_ids() -> Vec<String> {
    let reg = registry().read();
    let ids: BTreeSet<&String> = reg.enc_ids.keys().chain(reg.dec_ids.keys()).collect();
    ids.into_iter().cloned().collect()
}

pub(crate) fn encoder_for(ty: TypeId) -> Option<EncodeAdapter> {
    registry().read().encoders.get(&ty).cloned()
}

pub(crate) fn decoder_for(ty: TypeId) -> Option<DecodeAdapter> {
    registry().read().decoders.get(&ty).cloned()
}

pub(crate) fn dynamic_for(ext_id: &str) -> Option<Arc<DynamicExt>> {
    registry().read().dynamic.get(ext_id).cloned()
}
