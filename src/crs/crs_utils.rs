pub type EpsgCode = u32;

pub fn epsg_4326() -> gdal::spatial_ref::SpatialRef {
    gdal::spatial_ref::SpatialRef::from_epsg(4326).unwrap()
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

/// Whether two spatial refs carry the same EPSG authority code. Used to skip
/// redundant reprojection.
pub fn same_authority_code(
    a: &gdal::spatial_ref::SpatialRef,
    b: &gdal::spatial_ref::SpatialRef,
) -> anyhow::Result<bool> {
    Ok(a.auth_code()? == b.auth_code()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_authority_code() {
        let wgs84 = epsg_4326();
        let ny_li_ft = gdal::spatial_ref::SpatialRef::from_epsg(2263).unwrap();
        assert!(same_authority_code(&wgs84, &epsg_4326()).unwrap());
        assert!(!same_authority_code(&wgs84, &ny_li_ft).unwrap());
    }

    #[test]
    fn test_epsg_code_to_authority_string() {
        assert_eq!(epsg_code_to_authority_string(2263), "EPSG:2263");
    }
}
