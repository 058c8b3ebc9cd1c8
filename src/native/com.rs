//! COM binding for the Visual Studio Setup Configuration API.
//!
//! The interfaces are declared by hand from `Setup.Configuration.h`; only the
//! vtable slots we call are typed, the rest are kept as placeholders so the
//! layout stays right.

#![allow(non_snake_case, dead_code, clippy::upper_case_acronyms)]

use std::ffi::{c_void, OsString};
use std::ops::Deref;
use std::os::windows::ffi::OsStringExt;
use std::path::PathBuf;
use std::ptr::{self, NonNull};

use windows_sys::core::{BSTR, GUID, HRESULT, PCWSTR};
use windows_sys::Win32::Foundation::{SysFreeString, SysStringLen, RPC_E_CHANGED_MODE};
use windows_sys::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED, SAFEARRAY,
};
use windows_sys::Win32::System::Ole::SafeArrayDestroy;

use super::{InstanceIter, InstanceState, PackageReference, SetupInstance, SetupService};
use crate::error::SetupError;
use crate::toolset;
use crate::version::PackedVersion;

const CLSID_SETUP_CONFIGURATION: GUID = GUID::from_u128(0x177f0c4a_1cd3_4de7_a32c_71dbbb9fa36d);

fn failed(hr: HRESULT) -> bool {
    hr < 0
}

fn check(call: &'static str, hr: HRESULT) -> Result<(), SetupError> {
    if failed(hr) {
        Err(SetupError::native(call, hr))
    } else {
        Ok(())
    }
}

// =============================================================================
// Ownership wrappers
// =============================================================================

/// A COM interface with a known IID.
///
/// # Safety
/// `Self` must be `#[repr(C)]` with a vtable pointer as its only field, and
/// that vtable must start with the `IUnknown` slots.
pub unsafe trait Interface {
    const IID: GUID;
}

/// Reference-counted interface pointer.
///
/// Owns exactly one reference: cloning calls `AddRef`, dropping calls
/// `Release`. The raw pointer never outlives the wrapper.
pub struct ComPtr<T: Interface>(NonNull<T>);

impl<T: Interface> ComPtr<T> {
    /// Take ownership of a reference returned by a COM call.
    ///
    /// # Safety
    /// `ptr` must be null or a valid interface pointer whose reference is
    /// being handed over.
    unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(ComPtr)
    }

    fn as_raw(&self) -> *mut T {
        self.0.as_ptr()
    }

    fn unknown(&self) -> &IUnknown {
        unsafe { &*(self.as_raw() as *const IUnknown) }
    }

    /// `QueryInterface` for another interface on the same object.
    fn cast<U: Interface>(&self) -> Result<ComPtr<U>, SetupError> {
        unsafe { query_interface(self.as_raw() as *mut IUnknown) }
    }
}

impl<T: Interface> Deref for ComPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.0.as_ref() }
    }
}

impl<T: Interface> Clone for ComPtr<T> {
    fn clone(&self) -> Self {
        unsafe { self.unknown().AddRef() };
        ComPtr(self.0)
    }
}

impl<T: Interface> Drop for ComPtr<T> {
    fn drop(&mut self) {
        unsafe { self.unknown().Release() };
    }
}

/// # Safety
/// `unknown` must be null or a valid interface pointer.
unsafe fn query_interface<U: Interface>(unknown: *mut IUnknown) -> Result<ComPtr<U>, SetupError> {
    if unknown.is_null() {
        return Err(SetupError::native("QueryInterface", windows_sys::Win32::Foundation::E_POINTER));
    }
    let mut out: *mut c_void = ptr::null_mut();
    check("QueryInterface", (*unknown).QueryInterface(&U::IID, &mut out))?;
    ComPtr::from_raw(out as *mut U).ok_or(SetupError::native(
        "QueryInterface",
        windows_sys::Win32::Foundation::E_NOINTERFACE,
    ))
}

/// A `BSTR` received from the service. Freed exactly once on drop.
struct BStr(BSTR);

impl BStr {
    fn new() -> Self {
        BStr(ptr::null())
    }

    fn as_out(&mut self) -> *mut BSTR {
        &mut self.0
    }

    fn as_wide(&self) -> &[u16] {
        if self.0.is_null() {
            return &[];
        }
        unsafe {
            let len = SysStringLen(self.0) as usize;
            std::slice::from_raw_parts(self.0, len)
        }
    }

    fn to_os_string(&self) -> OsString {
        OsString::from_wide(self.as_wide())
    }

    fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_wide())
    }
}

impl Drop for BStr {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { SysFreeString(self.0) };
        }
    }
}

/// A `SAFEARRAY` of `IUnknown` received from the service. Destroying it
/// releases the contained references.
struct SafeArray(*mut SAFEARRAY);

impl SafeArray {
    fn unknowns(&self) -> &[*mut IUnknown] {
        unsafe {
            let array = &*self.0;
            if array.pvData.is_null() || array.cDims != 1 {
                return &[];
            }
            std::slice::from_raw_parts(
                array.pvData as *const *mut IUnknown,
                array.rgsabound[0].cElements as usize,
            )
        }
    }
}

impl Drop for SafeArray {
    fn drop(&mut self) {
        unsafe { SafeArrayDestroy(self.0) };
    }
}

/// COM initialization for the current thread, undone on drop when we did it.
struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    fn enter() -> Result<Self, SetupError> {
        let hr = unsafe { CoInitializeEx(ptr::null(), COINIT_MULTITHREADED as _) };
        if hr == RPC_E_CHANGED_MODE {
            // Someone already set up a different apartment on this thread.
            return Ok(ComApartment { initialized: false });
        }
        if failed(hr) {
            return Err(SetupError::ServiceUnavailable(format!(
                "CoInitializeEx failed with code {:#010x}",
                hr
            )));
        }
        Ok(ComApartment { initialized: true })
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe { CoUninitialize() };
        }
    }
}

// =============================================================================
// Interface declarations
// =============================================================================

type Slot = *const c_void;

#[repr(C)]
struct IUnknownVtbl {
    QueryInterface:
        unsafe extern "system" fn(*mut IUnknown, *const GUID, *mut *mut c_void) -> HRESULT,
    AddRef: unsafe extern "system" fn(*mut IUnknown) -> u32,
    Release: unsafe extern "system" fn(*mut IUnknown) -> u32,
}

#[repr(C)]
pub struct IUnknown {
    vtbl: *const IUnknownVtbl,
}

impl IUnknown {
    unsafe fn this(&self) -> *mut IUnknown {
        self as *const _ as *mut _
    }

    unsafe fn QueryInterface(&self, iid: *const GUID, out: *mut *mut c_void) -> HRESULT {
        ((*self.vtbl).QueryInterface)(self.this(), iid, out)
    }

    unsafe fn AddRef(&self) -> u32 {
        ((*self.vtbl).AddRef)(self.this())
    }

    unsafe fn Release(&self) -> u32 {
        ((*self.vtbl).Release)(self.this())
    }
}

#[repr(C)]
struct ISetupInstanceVtbl {
    parent: IUnknownVtbl,
    GetInstanceId: unsafe extern "system" fn(*mut ISetupInstance, *mut BSTR) -> HRESULT,
    GetInstallDate: Slot,
    GetInstallationName: Slot,
    GetInstallationPath: unsafe extern "system" fn(*mut ISetupInstance, *mut BSTR) -> HRESULT,
    GetInstallationVersion: unsafe extern "system" fn(*mut ISetupInstance, *mut BSTR) -> HRESULT,
    GetDisplayName: Slot,
    GetDescription: Slot,
    ResolvePath: Slot,
}

#[repr(C)]
pub struct ISetupInstance {
    vtbl: *const ISetupInstanceVtbl,
}

unsafe impl Interface for ISetupInstance {
    const IID: GUID = GUID::from_u128(0xb41463c3_8866_43b5_bc33_2b0676f7f42e);
}

#[repr(C)]
struct ISetupInstance2Vtbl {
    parent: ISetupInstanceVtbl,
    GetState: unsafe extern "system" fn(*mut ISetupInstance2, *mut u32) -> HRESULT,
    GetPackages: unsafe extern "system" fn(*mut ISetupInstance2, *mut *mut SAFEARRAY) -> HRESULT,
    GetProduct: Slot,
    GetProductPath: Slot,
}

#[repr(C)]
pub struct ISetupInstance2 {
    vtbl: *const ISetupInstance2Vtbl,
}

unsafe impl Interface for ISetupInstance2 {
    const IID: GUID = GUID::from_u128(0x89143c9a_05af_49b0_b717_72e218a2185c);
}

impl ISetupInstance2 {
    fn base(&self) -> *mut ISetupInstance {
        self as *const _ as *mut ISetupInstance
    }

    fn this(&self) -> *mut ISetupInstance2 {
        self as *const _ as *mut _
    }

    fn read_bstr(
        &self,
        call: &'static str,
        method: unsafe extern "system" fn(*mut ISetupInstance, *mut BSTR) -> HRESULT,
    ) -> Result<BStr, SetupError> {
        let mut value = BStr::new();
        check(call, unsafe { method(self.base(), value.as_out()) })?;
        Ok(value)
    }

    fn instance_id(&self) -> Result<BStr, SetupError> {
        let method = unsafe { (*self.vtbl).parent.GetInstanceId };
        self.read_bstr("GetInstanceId", method)
    }

    fn installation_path(&self) -> Result<BStr, SetupError> {
        let method = unsafe { (*self.vtbl).parent.GetInstallationPath };
        self.read_bstr("GetInstallationPath", method)
    }

    fn installation_version(&self) -> Result<BStr, SetupError> {
        let method = unsafe { (*self.vtbl).parent.GetInstallationVersion };
        self.read_bstr("GetInstallationVersion", method)
    }

    fn state(&self) -> Result<u32, SetupError> {
        let mut state = 0u32;
        check("GetState", unsafe {
            ((*self.vtbl).GetState)(self.this(), &mut state)
        })?;
        Ok(state)
    }

    fn packages(&self) -> Result<SafeArray, SetupError> {
        let mut array: *mut SAFEARRAY = ptr::null_mut();
        check("GetPackages", unsafe {
            ((*self.vtbl).GetPackages)(self.this(), &mut array)
        })?;
        if array.is_null() {
            return Err(SetupError::PackageEnumeration(
                "GetPackages returned no array".to_string(),
            ));
        }
        Ok(SafeArray(array))
    }
}

#[repr(C)]
struct IEnumSetupInstancesVtbl {
    parent: IUnknownVtbl,
    Next: unsafe extern "system" fn(
        *mut IEnumSetupInstances,
        u32,
        *mut *mut ISetupInstance,
        *mut u32,
    ) -> HRESULT,
    Skip: Slot,
    Reset: Slot,
    Clone: Slot,
}

#[repr(C)]
pub struct IEnumSetupInstances {
    vtbl: *const IEnumSetupInstancesVtbl,
}

unsafe impl Interface for IEnumSetupInstances {
    const IID: GUID = GUID::from_u128(0x6380bcff_41d3_4b2e_8b2e_bf8a6810c848);
}

impl IEnumSetupInstances {
    /// Fetch the next instance, `None` once the enumerator is exhausted.
    fn next(&self) -> Option<ComPtr<ISetupInstance>> {
        let mut instance: *mut ISetupInstance = ptr::null_mut();
        let mut fetched = 0u32;
        let hr = unsafe {
            ((*self.vtbl).Next)(self as *const _ as *mut _, 1, &mut instance, &mut fetched)
        };
        if failed(hr) || fetched == 0 {
            return None;
        }
        unsafe { ComPtr::from_raw(instance) }
    }
}

#[repr(C)]
struct ISetupConfigurationVtbl {
    parent: IUnknownVtbl,
    EnumInstances: unsafe extern "system" fn(
        *mut ISetupConfiguration,
        *mut *mut IEnumSetupInstances,
    ) -> HRESULT,
    GetInstanceForCurrentProcess: Slot,
    GetInstanceForPath: Slot,
}

#[repr(C)]
pub struct ISetupConfiguration {
    vtbl: *const ISetupConfigurationVtbl,
}

unsafe impl Interface for ISetupConfiguration {
    const IID: GUID = GUID::from_u128(0x42843719_db4c_46c2_8e7c_64f1816efd5b);
}

#[repr(C)]
struct ISetupConfiguration2Vtbl {
    parent: ISetupConfigurationVtbl,
    EnumAllInstances: unsafe extern "system" fn(
        *mut ISetupConfiguration2,
        *mut *mut IEnumSetupInstances,
    ) -> HRESULT,
}

#[repr(C)]
pub struct ISetupConfiguration2 {
    vtbl: *const ISetupConfiguration2Vtbl,
}

unsafe impl Interface for ISetupConfiguration2 {
    const IID: GUID = GUID::from_u128(0x26aab78c_4a60_49d6_af3b_3c35bc93365d);
}

impl ISetupConfiguration2 {
    /// Enumerate every registered instance, including incomplete ones.
    ///
    /// `EnumInstances` on the base interface only yields launchable
    /// instances, which would hide anything the state checks should judge.
    fn enum_all_instances(&self) -> Result<ComPtr<IEnumSetupInstances>, SetupError> {
        let mut instances: *mut IEnumSetupInstances = ptr::null_mut();
        check("EnumAllInstances", unsafe {
            ((*self.vtbl).EnumAllInstances)(self as *const _ as *mut _, &mut instances)
        })?;
        unsafe { ComPtr::from_raw(instances) }.ok_or_else(|| {
            SetupError::ServiceUnavailable("EnumAllInstances returned no enumerator".to_string())
        })
    }
}

#[repr(C)]
struct ISetupPackageReferenceVtbl {
    parent: IUnknownVtbl,
    GetId: unsafe extern "system" fn(*mut ISetupPackageReference, *mut BSTR) -> HRESULT,
    GetVersion: Slot,
    GetChip: Slot,
    GetLanguage: Slot,
    GetBranch: Slot,
    GetType: Slot,
    GetUniqueId: Slot,
    GetIsExtension: Slot,
}

#[repr(C)]
pub struct ISetupPackageReference {
    vtbl: *const ISetupPackageReferenceVtbl,
}

unsafe impl Interface for ISetupPackageReference {
    const IID: GUID = GUID::from_u128(0xda8d8a16_b2b6_4487_a2f1_594ccccd6bf5);
}

impl ISetupPackageReference {
    fn id(&self) -> Result<BStr, SetupError> {
        let mut id = BStr::new();
        check("GetId", unsafe {
            ((*self.vtbl).GetId)(self as *const _ as *mut _, id.as_out())
        })?;
        Ok(id)
    }
}

#[repr(C)]
struct ISetupHelperVtbl {
    parent: IUnknownVtbl,
    ParseVersion: unsafe extern "system" fn(*mut ISetupHelper, PCWSTR, *mut u64) -> HRESULT,
    ParseVersionRange: Slot,
}

#[repr(C)]
pub struct ISetupHelper {
    vtbl: *const ISetupHelperVtbl,
}

unsafe impl Interface for ISetupHelper {
    const IID: GUID = GUID::from_u128(0x42b21b78_6192_463e_87bf_d577838f1d5c);
}

impl ISetupHelper {
    fn parse_version(&self, version: &str) -> Result<u64, SetupError> {
        let wide: Vec<u16> = version.encode_utf16().chain(Some(0)).collect();
        let mut packed = 0u64;
        check("ParseVersion", unsafe {
            ((*self.vtbl).ParseVersion)(self as *const _ as *mut _, wide.as_ptr(), &mut packed)
        })?;
        Ok(packed)
    }
}

// =============================================================================
// SetupService implementation
// =============================================================================

/// Connection to the Setup Configuration coclass.
pub struct ComSetupService {
    config: ComPtr<ISetupConfiguration2>,
    helper: ComPtr<ISetupHelper>,
    // Declared last so the interfaces above are released first.
    _apartment: ComApartment,
}

impl ComSetupService {
    /// Activate the coclass and acquire the configuration and helper interfaces.
    pub fn connect() -> Result<Self, SetupError> {
        let apartment = ComApartment::enter()?;

        let mut raw: *mut c_void = ptr::null_mut();
        let hr = unsafe {
            CoCreateInstance(
                &CLSID_SETUP_CONFIGURATION,
                ptr::null_mut(),
                CLSCTX_ALL,
                &ISetupConfiguration::IID,
                &mut raw,
            )
        };
        if failed(hr) {
            return Err(SetupError::ServiceUnavailable(format!(
                "SetupConfiguration is not registered (code {:#010x})",
                hr
            )));
        }
        let config = unsafe { ComPtr::from_raw(raw as *mut ISetupConfiguration) }.ok_or_else(
            || SetupError::ServiceUnavailable("CoCreateInstance returned null".to_string()),
        )?;

        let unavailable = |e: SetupError| SetupError::ServiceUnavailable(e.to_string());
        let config2 = config.cast::<ISetupConfiguration2>().map_err(unavailable)?;
        let helper = config.cast::<ISetupHelper>().map_err(unavailable)?;

        Ok(ComSetupService {
            config: config2,
            helper,
            _apartment: apartment,
        })
    }
}

impl SetupService for ComSetupService {
    fn instances(&self) -> Result<InstanceIter<'_>, SetupError> {
        let instances = self.config.enum_all_instances()?;
        Ok(Box::new(std::iter::from_fn(move || {
            let instance = instances.next()?;
            Some(
                instance
                    .cast::<ISetupInstance2>()
                    .map(|inner| Box::new(ComInstance { inner }) as Box<dyn SetupInstance>),
            )
        })))
    }

    fn parse_version(&self, version: &str) -> Result<PackedVersion, SetupError> {
        self.helper
            .parse_version(version)
            .map(PackedVersion::from_raw)
            .map_err(|_| SetupError::InvalidVersion(version.to_string()))
    }
}

struct ComInstance {
    inner: ComPtr<ISetupInstance2>,
}

impl SetupInstance for ComInstance {
    fn instance_id(&self) -> Result<String, SetupError> {
        Ok(self.inner.instance_id()?.to_string_lossy())
    }

    fn state(&self) -> Result<InstanceState, SetupError> {
        self.inner.state().map(InstanceState::from_bits)
    }

    fn installation_path(&self) -> Result<PathBuf, SetupError> {
        Ok(PathBuf::from(self.inner.installation_path()?.to_os_string()))
    }

    fn installation_version(&self) -> Result<String, SetupError> {
        Ok(self.inner.installation_version()?.to_string_lossy())
    }

    fn packages(&self) -> Result<Vec<PackageReference>, SetupError> {
        let array = self
            .inner
            .packages()
            .map_err(|e| SetupError::PackageEnumeration(e.to_string()))?;

        let packages = array
            .unknowns()
            .iter()
            .filter_map(|&unknown| {
                unsafe { query_interface::<ISetupPackageReference>(unknown) }.ok()
            })
            .filter_map(|package| package.id().ok())
            .map(|id| PackageReference::new(id.to_string_lossy()))
            .collect();
        Ok(packages)
    }

    fn toolset_version(&self) -> Option<String> {
        let root = self.installation_path().ok()?;
        toolset::default_toolset_version(&root)
    }
}
